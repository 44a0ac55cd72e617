use std::fs;

use predicates::prelude::*;
use topshelf::formats::RankedProduct;

fn ranked_from_stdout(stdout: &[u8]) -> Vec<RankedProduct> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("parse ranked product json"))
        .collect()
}

#[test]
fn rank_keeps_first_of_each_price_and_orders_descending() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let input = temp.path().join("products.csv");
    fs::write(
        &input,
        "name,price,image,link\n\"A\",100,img1,link1\n\"B\",150,img2,link2\n\"C\",100,img3,link3\n",
    )?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("topshelf");
    let output = cmd
        .args(["rank", "--input", input.to_str().unwrap(), "--top-n", "2"])
        .assert()
        .success()
        .get_output()
        .clone();

    let ranked = ranked_from_stdout(&output.stdout);
    let summary: Vec<(&str, f64)> = ranked.iter().map(|p| (p.name.as_str(), p.price)).collect();
    assert_eq!(summary, vec![("B", 150.0), ("A", 100.0)]);
    assert_eq!(ranked[1].link, "link1");
    Ok(())
}

#[test]
fn rank_reads_top_n_from_config_file() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let input = temp.path().join("products.csv");
    let config = temp.path().join("topshelf.yaml");
    fs::write(
        &input,
        "name,price,image,link\nTee,$20.00,i1,l1\nHoodie,$65.00,i2,l2\nCap,$15.00,i3,l3\n",
    )?;
    fs::write(&config, "topN: 1\n")?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("topshelf");
    let output = cmd
        .args([
            "rank",
            "--input",
            input.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ])
        .assert()
        .success()
        .get_output()
        .clone();

    let ranked = ranked_from_stdout(&output.stdout);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].name, "Hoodie");
    assert_eq!(ranked[0].price, 65.0);
    Ok(())
}

#[test]
fn rank_defaults_to_five_products() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let input = temp.path().join("products.csv");
    let mut table = String::from("name,price,image,link\n");
    for i in 0..8 {
        table.push_str(&format!("P{i},${}.00,img{i},link{i}\n", 10 + i));
    }
    fs::write(&input, table)?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("topshelf");
    let output = cmd
        .args(["rank", "--input", input.to_str().unwrap()])
        .assert()
        .success()
        .get_output()
        .clone();

    let ranked = ranked_from_stdout(&output.stdout);
    let names: Vec<&str> = ranked.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["P7", "P6", "P5", "P4", "P3"]);
    Ok(())
}

#[test]
fn rank_rejects_short_rows() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let input = temp.path().join("products.csv");
    fs::write(&input, "name,price,image,link\nA,100,img1\n")?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("topshelf");
    cmd.args(["rank", "--input", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected at least 4"));
    Ok(())
}

#[test]
fn rank_rejects_unknown_config_keys() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let input = temp.path().join("products.csv");
    let config = temp.path().join("topshelf.yaml");
    fs::write(&input, "name,price,image,link\nA,100,img1,link1\n")?;
    fs::write(&config, "topN: 2\nretries: 3\n")?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("topshelf");
    cmd.args([
        "rank",
        "--input",
        input.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown field"));
    Ok(())
}

#[test]
fn missing_table_fails_with_path_in_message() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("topshelf");
    cmd.args(["rank", "--input", "does-not-exist/products.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist/products.csv"));
}

#[test]
fn rust_log_debug_emits_parsed_cli_to_stderr() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let input = temp.path().join("products.csv");
    fs::write(&input, "name,price,image,link\nA,100,img1,link1\n")?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("topshelf");
    cmd.env("RUST_LOG", "debug")
        .args(["rank", "--input", input.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
    Ok(())
}
