//! Integration tests for Rigger

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    const PROJECT: &str = r#"
[image]
name = "ghcr.io/acme/op:dev"

[tools.controller-gen]
module = "sigs.k8s.io/controller-tools/cmd/controller-gen"
version = "v0.14.0"

[tasks.a]
help = "First step"
category = "Build"
run = ["echo a >> order.txt"]

[tasks.b]
help = "Second step"
category = "Build"
deps = ["a"]
run = ["echo b >> order.txt"]

[tasks.c]
help = "Depends on both"
category = "Test"
deps = ["a", "b"]
run = ["echo c >> order.txt"]

[tasks.hidden]
deps = ["a"]
run = ["echo hidden >> order.txt"]

[tasks.image-name]
run = ["printf '%s' \"$IMG\" > img.txt"]

[tasks.broken]
deps = ["a"]
run = ["exit 7", "echo unreachable >> order.txt"]
"#;

    fn rigger(dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("rigger");
        cmd.current_dir(dir);
        for var in ["IMG", "PLATFORMS", "VERSION", "RIGGER_CONFIG", "USE_EXISTING_CLUSTER"] {
            cmd.env_remove(var);
        }
        cmd
    }

    fn project(toml: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("rigger.toml"), toml).unwrap();
        dir
    }

    fn order(dir: &Path) -> String {
        std::fs::read_to_string(dir.join("order.txt")).unwrap_or_default()
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        rigger(dir.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("build, test and release"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        rigger(dir.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("rigger"));
    }

    #[test]
    fn completions_need_no_project() {
        let dir = TempDir::new().unwrap();
        rigger(dir.path())
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("rigger"));
    }

    #[test]
    fn missing_project_file() {
        let dir = TempDir::new().unwrap();
        rigger(dir.path())
            .arg("list")
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("Configuration file not found"));
    }

    #[test]
    fn dependencies_run_first_and_once() {
        let dir = project(PROJECT);

        rigger(dir.path()).args(["run", "c"]).assert().success();
        assert_eq!(order(dir.path()), "a\nb\nc\n");
    }

    #[test]
    fn shared_dependencies_run_once_per_invocation() {
        let dir = project(PROJECT);

        rigger(dir.path())
            .args(["run", "b", "hidden", "c"])
            .assert()
            .success();
        assert_eq!(order(dir.path()), "a\nb\nhidden\nc\n");
    }

    #[test]
    fn pooled_run_respects_dependencies() {
        let dir = project(PROJECT);

        rigger(dir.path())
            .args(["run", "--jobs", "3", "c"])
            .assert()
            .success();
        assert_eq!(order(dir.path()), "a\nb\nc\n");
    }

    #[test]
    fn failing_step_propagates_exit_status() {
        let dir = project(PROJECT);

        rigger(dir.path())
            .args(["run", "broken"])
            .assert()
            .failure()
            .code(7)
            .stderr(predicate::str::contains("Task broken failed"));
        assert_eq!(order(dir.path()), "a\n");
    }

    #[test]
    fn unknown_task_runs_nothing() {
        let dir = project(PROJECT);

        rigger(dir.path())
            .args(["run", "a", "nope"])
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("Unknown task: nope"))
            .stderr(predicate::str::contains("rigger list"));
        assert_eq!(order(dir.path()), "");
    }

    #[test]
    fn dry_run_has_no_side_effects() {
        let dir = project(PROJECT);

        rigger(dir.path())
            .args(["run", "--dry-run", "c"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1. a"))
            .stdout(predicate::str::contains("3. c"))
            .stdout(predicate::str::contains("$ echo c >> order.txt"));
        assert!(!dir.path().join("order.txt").exists());
    }

    #[test]
    fn img_is_exported_to_steps() {
        let dir = project(PROJECT);

        rigger(dir.path())
            .env("IMG", "registry.local/op:pr-12")
            .args(["run", "image-name"])
            .assert()
            .success();
        let img = std::fs::read_to_string(dir.path().join("img.txt")).unwrap();
        assert_eq!(img, "registry.local/op:pr-12");
    }

    #[cfg(unix)]
    #[test]
    fn tools_dir_is_on_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = project(
            r#"
[tasks.greet]
run = ["rigger-test-hello > hello.txt"]
"#,
        );
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let script = bin.join("rigger-test-hello");
        std::fs::write(&script, "#!/bin/sh\necho hello\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        rigger(dir.path()).args(["run", "greet"]).assert().success();
        let out = std::fs::read_to_string(dir.path().join("hello.txt")).unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[test]
    fn check_reports_cycle() {
        let dir = project(
            r#"
[tasks.x]
deps = ["y"]

[tasks.y]
deps = ["x"]
"#,
        );

        rigger(dir.path())
            .arg("check")
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("x -> y -> x"));
    }

    #[test]
    fn check_accepts_valid_graph() {
        let dir = project(PROJECT);
        rigger(dir.path())
            .arg("check")
            .assert()
            .success()
            .stdout(predicate::str::contains("Task graph is valid"));
    }

    #[test]
    fn undeclared_tool_is_invalid_config() {
        let dir = project(
            r#"
[tasks.gen]
tools = ["kustomize"]
"#,
        );
        rigger(dir.path())
            .arg("check")
            .assert()
            .failure()
            .stderr(predicate::str::contains("undeclared tool kustomize"));
    }

    #[test]
    fn list_groups_documented_tasks() {
        let dir = project(PROJECT);

        rigger(dir.path())
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("Build"))
            .stdout(predicate::str::contains("Depends on both"))
            .stdout(predicate::str::contains("hidden").not());
    }

    #[test]
    fn list_plain_is_sorted_by_category() {
        let dir = project(PROJECT);

        rigger(dir.path())
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout("a\nb\nc\n");
    }

    #[test]
    fn list_json() {
        let dir = project(PROJECT);

        let output = rigger(dir.path())
            .args(["list", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let tasks: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(tasks.as_array().unwrap().len(), 3);
        assert_eq!(tasks[2]["category"], "Test");
    }

    #[test]
    fn tools_list_json_reports_missing() {
        let dir = project(PROJECT);

        let output = rigger(dir.path())
            .args(["tools", "list", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let tools: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(tools[0]["name"], "controller-gen");
        assert_eq!(tools[0]["installed"], false);
    }

    #[test]
    fn release_requires_version() {
        let dir = project(PROJECT);
        rigger(dir.path())
            .arg("release")
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("No release version given"));
    }

    #[test]
    fn release_rejects_invalid_version() {
        let dir = project(PROJECT);
        rigger(dir.path())
            .args(["release", "latest"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid release version 'latest'"));
    }

    #[test]
    fn config_path_points_at_project_file() {
        let dir = project(PROJECT);
        rigger(dir.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("rigger.toml"));
    }

    #[test]
    fn config_show_applies_overrides() {
        let dir = project(PROJECT);
        rigger(dir.path())
            .env("PLATFORMS", "linux/amd64,linux/ppc64le")
            .args(["--img", "op:override", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"))
            .stdout(predicate::str::contains("op:override"))
            .stdout(predicate::str::contains("linux/ppc64le"));
    }

    #[test]
    fn tool_version_pinned_from_environment() {
        let dir = project(PROJECT);
        rigger(dir.path())
            .env("CONTROLLER_GEN_VERSION", "v0.15.0")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("v0.15.0"));
    }

    #[test]
    fn clean_removes_tools_dir() {
        let dir = project(PROJECT);
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("controller-gen"), "").unwrap();
        std::fs::write(dir.path().join("cover.out"), "mode: set\n").unwrap();

        rigger(dir.path()).args(["clean", "--yes"]).assert().success();

        assert!(!bin.exists());
        assert!(!dir.path().join("cover.out").exists());
    }

    #[test]
    fn clean_without_yes_keeps_files() {
        let dir = project(PROJECT);
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();

        rigger(dir.path())
            .arg("clean")
            .assert()
            .success()
            .stdout(predicate::str::contains("Clean cancelled"));
        assert!(bin.exists());
    }
}
