use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use url::Url;

use crate::error::ScrapeError;
use crate::formats::{ListingArtifactMeta, ListingRecord};

pub const LISTINGS_FORMAT: &str = "topshelf.listings";
pub const LISTINGS_VERSION: u32 = 1;

const HEADER: [&str; 4] = ["name", "price", "image", "link"];

pub fn meta_path(table_path: &Path) -> PathBuf {
    let mut name = table_path.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

/// Writes the listing table (and its sidecar), replacing any previous table at `path`.
///
/// Double quotes are removed from every field and nothing is escaped, so a field containing a
/// comma will not survive a round trip.
pub fn write_listings(
    path: &Path,
    records: &[ListingRecord],
    source_url: Option<&Url>,
) -> anyhow::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create listing table dir: {}", parent.display()))?;

    let tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp listing table in {}", parent.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(tmp);

    writer.write_record(HEADER).context("write listing header")?;
    for record in records {
        writer
            .write_record([
                strip_quotes(&record.name),
                strip_quotes(&record.price),
                strip_quotes(&record.image),
                strip_quotes(&record.link),
            ])
            .context("write listing row")?;
    }

    let tmp = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("flush listing table: {}", err.error()))?;
    tmp.persist(path)
        .with_context(|| format!("replace listing table: {}", path.display()))?;

    let meta = ListingArtifactMeta {
        format: LISTINGS_FORMAT.to_owned(),
        version: LISTINGS_VERSION,
        source_url: source_url.map(Url::to_string),
        records: records.len(),
        written_at: chrono::Utc::now().to_rfc3339(),
    };
    let meta_path = meta_path(path);
    let mut out = std::fs::File::create(&meta_path)
        .with_context(|| format!("create listing metadata: {}", meta_path.display()))?;
    serde_json::to_writer_pretty(&mut out, &meta).context("serialize listing metadata")?;
    out.write_all(b"\n").context("write listing metadata newline")?;
    out.flush().context("flush listing metadata")?;

    tracing::info!(path = %path.display(), records = records.len(), "listing table written");
    Ok(())
}

/// Reads a listing table: the first line is skipped, every other non-empty line must carry at
/// least four comma-separated fields.
pub fn read_listings(path: &Path) -> anyhow::Result<Vec<ListingRecord>> {
    check_meta(path)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_path(path)
        .with_context(|| format!("open listing table: {}", path.display()))?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("read listing table: {}", path.display()))?;
        let line = row.position().map_or(0, |pos| pos.line() as usize);

        let fields: Vec<String> = row
            .iter()
            .map(|field| strip_quotes(field).trim().to_owned())
            .collect();
        let [name, price, image, link, ..] = fields.as_slice() else {
            return Err(ScrapeError::MalformedRow {
                line,
                fields: fields.len(),
            })
            .with_context(|| format!("listing table: {}", path.display()));
        };

        records.push(ListingRecord {
            name: name.clone(),
            price: price.clone(),
            image: image.clone(),
            link: link.clone(),
        });
    }

    tracing::debug!(path = %path.display(), records = records.len(), "listing table read");
    Ok(records)
}

fn check_meta(path: &Path) -> anyhow::Result<()> {
    let meta_path = meta_path(path);
    let bytes = match std::fs::read(&meta_path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %meta_path.display(), "no listing metadata; accepting table as is");
            return Ok(());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("read listing metadata: {}", meta_path.display()));
        }
    };

    let meta: ListingArtifactMeta = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse listing metadata: {}", meta_path.display()))?;
    if meta.format != LISTINGS_FORMAT || meta.version != LISTINGS_VERSION {
        return Err(ScrapeError::Artifact {
            path: path.display().to_string(),
            message: format!(
                "unsupported format {}/v{} (expected {LISTINGS_FORMAT}/v{LISTINGS_VERSION})",
                meta.format, meta.version
            ),
        }
        .into());
    }
    Ok(())
}

fn strip_quotes(field: &str) -> String {
    field.replace('"', "")
}
