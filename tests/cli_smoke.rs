use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn daysheet_help_works() {
    Command::cargo_bin("daysheet")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("daily task tracking"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        vec!["init"],
        vec!["task"],
        vec!["task", "add"],
        vec!["task", "show"],
        vec!["task", "all"],
        vec!["log", "upsert"],
        vec!["log", "list"],
        vec!["meta", "upsert"],
        vec!["meta", "touch"],
        vec!["meta", "list"],
    ];

    for cmd in subcommands {
        Command::cargo_bin("daysheet")
            .expect("binary")
            .args(&cmd)
            .arg("--help")
            .assert()
            .success();
    }
}
