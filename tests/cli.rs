//! Black-box integration tests driving the built binary against a scratch
//! repository (§4.N).

use std::process::Command;

use tempfile::tempdir;

fn git(dir: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_mini-git"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run mini-git")
}

#[test]
fn init_creates_git_skeleton() {
    let dir = tempdir().unwrap();
    let out = git(dir.path(), &["init"]);
    assert!(out.status.success(), "{:?}", out);
    assert!(dir.path().join(".git/objects").is_dir());
    assert!(dir.path().join(".git/refs/heads").is_dir());

    let head = std::fs::read_to_string(dir.path().join(".git/HEAD")).unwrap();
    assert_eq!(head, "ref: refs/heads/main\n");
}

#[test]
fn init_is_idempotent() {
    let dir = tempdir().unwrap();
    assert!(git(dir.path(), &["init"]).status.success());
    assert!(git(dir.path(), &["init"]).status.success());
}

#[test]
fn hash_object_and_cat_file_round_trip() {
    let dir = tempdir().unwrap();
    assert!(git(dir.path(), &["init"]).status.success());

    std::fs::write(dir.path().join("hello.txt"), "hello").unwrap();

    let out = git(dir.path(), &["hash-object", "-w", "hello.txt"]);
    assert!(out.status.success(), "{:?}", out);
    let sha = String::from_utf8(out.stdout).unwrap();
    assert_eq!(sha, "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");

    let out = git(dir.path(), &["cat-file", "-p", &sha]);
    assert!(out.status.success());
    assert_eq!(out.stdout, b"hello");

    let out = git(dir.path(), &["cat-file", "-t", &sha]);
    assert_eq!(String::from_utf8(out.stdout).unwrap().trim(), "blob");

    let out = git(dir.path(), &["cat-file", "-s", &sha]);
    assert_eq!(String::from_utf8(out.stdout).unwrap().trim(), "5");
}

#[test]
fn write_tree_produces_empty_tree_sha_for_empty_directory() {
    let dir = tempdir().unwrap();
    assert!(git(dir.path(), &["init"]).status.success());

    let out = git(dir.path(), &["write-tree"]);
    assert!(out.status.success(), "{:?}", out);
    let sha = String::from_utf8(out.stdout).unwrap().trim().to_string();
    assert_eq!(sha, "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
}

#[test]
fn write_tree_and_commit_tree_produce_deterministic_commit() {
    let dir = tempdir().unwrap();
    assert!(git(dir.path(), &["init"]).status.success());
    std::fs::write(dir.path().join("a.txt"), "content").unwrap();

    let out = git(dir.path(), &["write-tree"]);
    assert!(out.status.success(), "{:?}", out);
    let tree_sha = String::from_utf8(out.stdout).unwrap().trim().to_string();

    let out = git(dir.path(), &["commit-tree", &tree_sha, "-m", "initial commit"]);
    assert!(out.status.success(), "{:?}", out);
    let commit_sha = String::from_utf8(out.stdout).unwrap().trim().to_string();
    assert_eq!(commit_sha.len(), 40);

    let out = git(dir.path(), &["cat-file", "-p", &commit_sha]);
    let commit_text = String::from_utf8(out.stdout).unwrap();
    assert!(commit_text.starts_with(&format!("tree {tree_sha}")));
    assert!(commit_text.ends_with("initial commit"));
}

#[test]
fn ls_tree_lists_entries_by_name() {
    let dir = tempdir().unwrap();
    assert!(git(dir.path(), &["init"]).status.success());
    std::fs::write(dir.path().join("a.txt"), "a").unwrap();
    std::fs::write(dir.path().join("b.txt"), "b").unwrap();

    let out = git(dir.path(), &["write-tree"]);
    let tree_sha = String::from_utf8(out.stdout).unwrap().trim().to_string();

    let out = git(dir.path(), &["ls-tree", "--name-only", &tree_sha]);
    assert!(out.status.success(), "{:?}", out);
    let names = String::from_utf8(out.stdout).unwrap();
    assert_eq!(names.lines().collect::<Vec<_>>(), vec!["a.txt", "b.txt"]);
}

#[test]
fn cat_file_on_unknown_sha_exits_with_pack_error_code() {
    let dir = tempdir().unwrap();
    assert!(git(dir.path(), &["init"]).status.success());

    let out = git(dir.path(), &["cat-file", "-p", &"0".repeat(40)]);
    assert!(!out.status.success());
    assert_eq!(out.status.code(), Some(128));
}
