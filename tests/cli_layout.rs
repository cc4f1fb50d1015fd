use assert_cmd::prelude::*;
use std::process::Command;

#[test]
fn command_layout() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("mgec")?;
    let output = cmd
        .arg("layout")
        .arg("tests/mgec/Ec1.fa")
        .arg("tests/mgec/Ec2.fa")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout.lines().count(), 5);
    assert!(stdout.contains("# Ec1\tEc1\t600\t2\tfasta"));
    assert!(stdout.contains("# Ec2\tEc2\t400\t1\tfasta"));
    assert!(stdout.contains("Ec1\tctg1\t1\t400\t400"));
    assert!(stdout.contains("Ec1\tctg2\t401\t600\t200"));
    assert!(stdout.contains("Ec2\tctg1\t1\t400\t400"));

    Ok(())
}

#[test]
fn command_layout_skips_unreadable_genome() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("mgec")?;
    let output = cmd
        .arg("layout")
        .arg("tests/mgec/no_such.fa")
        .arg("tests/mgec/Ec2.fa")
        .output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    let stderr = String::from_utf8(output.stderr)?;

    assert!(stdout.contains("# Ec2\tEc2\t400\t1\tfasta"));
    assert!(!stdout.contains("no_such"));
    assert!(stderr.contains("skipped"));

    Ok(())
}
