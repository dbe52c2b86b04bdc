use assert_cmd::Command;
use predicates::prelude::*;

const TREE: &str = "((A:1,B:2)X:1,(C:1,D:1)Y:2)R;";

#[test]
fn command_invalid() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phylokit")?;
    cmd.arg("foobar");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("recognized"));

    Ok(())
}

#[test]
fn command_stat() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phylokit")?;
    cmd.arg("stat")
        .arg("stdin")
        .write_stdin(TREE)
        .assert()
        .success()
        .stdout(predicate::str::contains("Type\tphylogram\n"))
        .stdout(predicate::str::contains("nodes\t7\n"))
        .stdout(predicate::str::contains("leaves\t4\n"))
        .stdout(predicate::str::contains("dichotomies\t3\n"))
        .stdout(predicate::str::contains("internal labels\t3\n"))
        .stdout(predicate::str::contains("binary\ttrue\n"))
        .stdout(predicate::str::contains("length\t8.0000\n"))
        .stdout(predicate::str::contains("height\t2.7500\n"))
        .stdout(predicate::str::contains("sackin\t8\n"))
        .stdout(predicate::str::contains("cherries\t2\n"))
        .stdout(predicate::str::contains("gamma\tNA\n"));

    Ok(())
}

#[test]
fn command_stat_line() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phylokit")?;
    let output = cmd
        .arg("stat")
        .arg("stdin")
        .arg("--style")
        .arg("line")
        .write_stdin("(A,B,C);\n((A,B),C);\n")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Type\tnodes\tleaves\tdichotomies"));
    assert!(lines[1].starts_with("cladogram\t4\t3\t0\t3\t0\tfalse\tfalse"));
    assert!(lines[2].starts_with("cladogram\t5\t3\t2\t3\t0\ttrue\ttrue"));
    // Colless is undefined for the polytomy
    assert!(lines[1].contains("\tNA\t"));

    Ok(())
}

#[test]
fn command_stat_file() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phylokit")?;
    cmd.arg("stat")
        .arg("tests/newick/hominidae.nwk")
        .assert()
        .success()
        .stdout(predicate::str::contains("nodes\t7\n"))
        .stdout(predicate::str::contains("leaf labels\t4\n"));

    Ok(())
}

#[test]
fn command_stat_parse_error() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phylokit")?;
    cmd.arg("stat")
        .arg("stdin")
        .write_stdin("((A,B);")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Parse error"));

    Ok(())
}

#[test]
fn command_distance_root() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phylokit")?;
    let output = cmd
        .arg("distance")
        .arg("stdin")
        .write_stdin(TREE)
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout, "A\t2\nB\t3\nC\t3\nD\t3\n");

    Ok(())
}

#[test]
fn command_distance_general_format() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phylokit")?;
    cmd.arg("distance")
        .arg("stdin")
        .write_stdin("(A:0.0000001,B:1234567);")
        .assert()
        .success()
        .stdout("A\t1e-07\nB\t1.23457e+06\n");

    let mut cmd = Command::cargo_bin("phylokit")?;
    cmd.arg("distance")
        .arg("stdin")
        .arg("--bl-format")
        .arg("%.3g")
        .write_stdin("(A:0.0000001,B:1234567);")
        .assert()
        .success()
        .stdout("A\t1e-07\nB\t1.23e+06\n");

    Ok(())
}

#[test]
fn command_distance_pairwise() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phylokit")?;
    cmd.arg("distance")
        .arg("stdin")
        .arg("--mode")
        .arg("pairwise")
        .arg("-n")
        .arg("A")
        .arg("-n")
        .arg("C")
        .write_stdin(TREE)
        .assert()
        .success()
        .stdout("A\tC\t5\n");

    let mut cmd = Command::cargo_bin("phylokit")?;
    cmd.arg("distance")
        .arg("stdin")
        .arg("--mode")
        .arg("pairwise")
        .arg("--nodal")
        .arg("-n")
        .arg("A")
        .arg("-n")
        .arg("C")
        .write_stdin(TREE)
        .assert()
        .success()
        .stdout("A\tC\t4\n");

    Ok(())
}

#[test]
fn command_distance_lca() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phylokit")?;
    cmd.arg("distance")
        .arg("tests/newick/hominidae.nwk")
        .arg("--mode")
        .arg("lca")
        .arg("-n")
        .arg("Homo")
        .arg("-n")
        .arg("Gorilla")
        .assert()
        .success()
        .stdout("Homo\tGorilla\tHomininae\n");

    Ok(())
}

#[test]
fn command_diversity() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phylokit")?;
    cmd.arg("diversity")
        .arg("stdin")
        .write_stdin(TREE)
        .assert()
        .success()
        .stdout("A\t1.5\nB\t2.5\nC\t2\nD\t2\n");

    let mut cmd = Command::cargo_bin("phylokit")?;
    let output = cmd
        .arg("diversity")
        .arg("stdin")
        .arg("--metric")
        .arg("all")
        .write_stdin(TREE)
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();

    assert_eq!(lines[0], "name\tfp\tes\tpe\tshapley");
    assert!(lines[1].starts_with("A\t1.5\t1.5\t1\t"));
    assert_eq!(lines.len(), 5);

    Ok(())
}
