//! Integration tests for the Git interface.
//!
//! These tests use real git repositories created via tempfile to verify
//! that the git2 reads and the CLI-backed `GitBackend` agree with what git
//! itself does.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tempfile::TempDir;

use autosync::core::config::PullStrategy;
use autosync::core::types::BranchName;
use autosync::git::{Git, GitBackend, GitError, GitState, Vcs};

/// A bare "remote" plus helpers to clone working copies from it.
struct TestRemote {
    root: TempDir,
    remote: PathBuf,
}

impl TestRemote {
    /// Create a remote whose `main` branch has one commit.
    fn new() -> Self {
        let root = TempDir::new().expect("failed to create temp dir");
        let seed = root.path().join("seed");
        std::fs::create_dir(&seed).unwrap();

        run_git(&seed, &["init", "-q"]);
        run_git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        configure_identity(&seed);
        std::fs::write(seed.join("README.md"), "# Test Repo\n").unwrap();
        run_git(&seed, &["add", "README.md"]);
        run_git(&seed, &["commit", "-q", "-m", "Initial commit"]);

        let remote = root.path().join("remote.git");
        run_git(
            root.path(),
            &["clone", "-q", "--bare", "seed", "remote.git"],
        );

        Self { root, remote }
    }

    /// Clone a working copy named `name`.
    fn clone(&self, name: &str) -> PathBuf {
        run_git(
            self.root.path(),
            &["clone", "-q", self.remote.to_str().unwrap(), name],
        );
        let path = self.root.path().join(name);
        configure_identity(&path);
        path
    }

    /// Tip of `main` on the remote.
    fn remote_head(&self) -> String {
        git_stdout(&self.remote, &["rev-parse", "refs/heads/main"])
    }
}

fn configure_identity(dir: &Path) {
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "user.name", "Test User"]);
    run_git(dir, &["config", "commit.gpgsign", "false"]);
}

/// Run a git command in the given directory.
fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

fn git_stdout(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn commit_file(dir: &Path, file: &str, content: &str, message: &str) {
    std::fs::write(dir.join(file), content).unwrap();
    run_git(dir, &["add", file]);
    run_git(dir, &["commit", "-q", "-m", message]);
}

fn backend() -> GitBackend {
    GitBackend::new(Duration::from_secs(60), PullStrategy::Merge)
}

fn main_branch() -> BranchName {
    BranchName::new("main").unwrap()
}

mod git_reads {
    use super::*;

    #[test]
    fn open_rejects_plain_directory() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            Git::open(temp.path()),
            Err(GitError::NotARepo { .. })
        ));
    }

    #[test]
    fn open_rejects_subdirectory() {
        let remote = TestRemote::new();
        let work = remote.clone("work");
        std::fs::create_dir(work.join("sub")).unwrap();

        assert!(matches!(
            Git::open(&work.join("sub")),
            Err(GitError::NotARepo { .. })
        ));
    }

    #[test]
    fn current_branch_and_tip() {
        let remote = TestRemote::new();
        let work = remote.clone("work");
        let git = Git::open(&work).unwrap();

        assert_eq!(git.current_branch().unwrap().as_str(), "main");
        let tip = git.try_resolve_ref("refs/heads/main").unwrap().unwrap();
        assert_eq!(tip.as_str(), git_stdout(&work, &["rev-parse", "HEAD"]));
        assert!(git.git_dir().ends_with(".git"));
    }

    #[test]
    fn detached_head_reported() {
        let remote = TestRemote::new();
        let work = remote.clone("work");
        run_git(&work, &["checkout", "-q", "--detach"]);

        let git = Git::open(&work).unwrap();
        assert!(matches!(git.current_branch(), Err(GitError::DetachedHead)));
    }

    #[test]
    fn untracked_files_do_not_make_tree_dirty() {
        let remote = TestRemote::new();
        let work = remote.clone("work");
        std::fs::write(work.join("scratch.txt"), "new").unwrap();

        let status = Git::open(&work).unwrap().worktree_status(true).unwrap();
        assert_eq!(status.untracked, 1);
        assert!(!status.is_dirty());
    }

    #[test]
    fn modified_and_staged_files_make_tree_dirty() {
        let remote = TestRemote::new();
        let work = remote.clone("work");

        std::fs::write(work.join("README.md"), "changed\n").unwrap();
        let status = Git::open(&work).unwrap().worktree_status(false).unwrap();
        assert_eq!(status.unstaged, 1);
        assert!(status.is_dirty());

        run_git(&work, &["add", "README.md"]);
        let status = Git::open(&work).unwrap().worktree_status(false).unwrap();
        assert_eq!(status.staged, 1);
        assert!(status.is_dirty());
    }

    #[test]
    fn missing_ref_resolves_to_none() {
        let remote = TestRemote::new();
        let work = remote.clone("work");
        let git = Git::open(&work).unwrap();

        assert!(git
            .try_resolve_ref("refs/remotes/origin/nope")
            .unwrap()
            .is_none());
        assert!(git.try_resolve_ref("refs/heads/main").unwrap().is_some());
    }

    #[test]
    fn merge_state_detected() {
        let remote = TestRemote::new();
        let work = remote.clone("work");
        run_git(&work, &["checkout", "-q", "-b", "side"]);
        commit_file(&work, "README.md", "side\n", "side change");
        run_git(&work, &["checkout", "-q", "main"]);
        commit_file(&work, "README.md", "main\n", "main change");

        let merge = Command::new("git")
            .args(["merge", "side"])
            .current_dir(&work)
            .output()
            .unwrap();
        assert!(!merge.status.success());

        let git = Git::open(&work).unwrap();
        assert_eq!(git.state(), GitState::Merge);
        assert!(git.worktree_status(false).unwrap().has_conflicts);
    }
}

mod backend {
    use super::*;

    #[test]
    fn fetch_updates_tracking_ref_only() {
        let remote = TestRemote::new();
        let work = remote.clone("work");
        let other = remote.clone("other");
        commit_file(&other, "notes.txt", "hello\n", "add notes");
        run_git(&other, &["push", "-q", "origin", "main"]);

        let vcs = backend();
        let before = vcs.resolve_ref(&work, "refs/heads/main").unwrap();
        vcs.fetch(&work, "origin", &main_branch()).unwrap();

        let tracking = vcs
            .resolve_ref(&work, "refs/remotes/origin/main")
            .unwrap()
            .unwrap();
        assert_eq!(tracking.as_str(), remote.remote_head());
        assert_eq!(vcs.resolve_ref(&work, "refs/heads/main").unwrap(), before);
        assert!(!work.join("notes.txt").exists());
    }

    #[test]
    fn fetch_from_unknown_remote_fails() {
        let remote = TestRemote::new();
        let work = remote.clone("work");

        let result = backend().fetch(&work, "nowhere", &main_branch());
        assert!(matches!(result, Err(GitError::CommandFailed { .. })));
    }

    #[test]
    fn stash_round_trip() {
        let remote = TestRemote::new();
        let work = remote.clone("work");
        std::fs::write(work.join("README.md"), "local edit\n").unwrap();
        let vcs = backend();

        assert!(vcs.is_dirty(&work).unwrap());
        assert!(vcs.stash_push(&work, "autosync test label").unwrap());
        assert!(!vcs.is_dirty(&work).unwrap());

        let entries = vcs.stash_list(&work).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].selector, "stash@{0}");
        assert!(entries[0].has_label("autosync test label"));

        vcs.stash_pop(&work, "autosync test label").unwrap();
        assert_eq!(
            std::fs::read_to_string(work.join("README.md")).unwrap(),
            "local edit\n"
        );
        assert!(vcs.stash_list(&work).unwrap().is_empty());
    }

    #[test]
    fn stash_of_clean_tree_reports_nothing_stashed() {
        let remote = TestRemote::new();
        let work = remote.clone("work");

        assert!(!backend().stash_push(&work, "label").unwrap());
    }

    #[test]
    fn pop_selects_labelled_entry() {
        let remote = TestRemote::new();
        let work = remote.clone("work");
        let vcs = backend();

        std::fs::write(work.join("README.md"), "first\n").unwrap();
        vcs.stash_push(&work, "label one").unwrap();
        std::fs::write(work.join("README.md"), "second\n").unwrap();
        vcs.stash_push(&work, "label two").unwrap();

        vcs.stash_pop(&work, "label one").unwrap();
        assert_eq!(
            std::fs::read_to_string(work.join("README.md")).unwrap(),
            "first\n"
        );
        let remaining = vcs.stash_list(&work).unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].has_label("label two"));
    }

    #[test]
    fn pop_of_unknown_label_fails() {
        let remote = TestRemote::new();
        let work = remote.clone("work");

        assert!(matches!(
            backend().stash_pop(&work, "never stashed"),
            Err(GitError::RefNotFound { .. })
        ));
    }

    #[test]
    fn stage_commit_push() {
        let remote = TestRemote::new();
        let work = remote.clone("work");
        let vcs = backend();

        std::fs::write(work.join("README.md"), "edited\n").unwrap();
        std::fs::write(work.join("new.txt"), "added\n").unwrap();
        vcs.stage_all(&work).unwrap();
        vcs.commit(&work, "Auto-sync: test [automated]").unwrap();
        vcs.push(&work, "origin", &main_branch()).unwrap();

        assert_eq!(git_stdout(&work, &["rev-parse", "HEAD"]), remote.remote_head());
        assert_eq!(
            git_stdout(&work, &["log", "-1", "--format=%s"]),
            "Auto-sync: test [automated]"
        );
        assert_eq!(git_stdout(&work, &["status", "--porcelain"]), "");
    }

    #[test]
    fn pull_fast_forwards() {
        let remote = TestRemote::new();
        let work = remote.clone("work");
        let other = remote.clone("other");
        commit_file(&other, "notes.txt", "hello\n", "add notes");
        run_git(&other, &["push", "-q", "origin", "main"]);

        backend().pull(&work, "origin", &main_branch()).unwrap();

        assert_eq!(git_stdout(&work, &["rev-parse", "HEAD"]), remote.remote_head());
        assert!(work.join("notes.txt").exists());
    }

    #[test]
    fn conflicting_pull_can_be_aborted() {
        let remote = TestRemote::new();
        let work = remote.clone("work");
        let other = remote.clone("other");
        commit_file(&other, "README.md", "theirs\n", "their change");
        run_git(&other, &["push", "-q", "origin", "main"]);
        commit_file(&work, "README.md", "ours\n", "our change");
        let ours = git_stdout(&work, &["rev-parse", "HEAD"]);
        let vcs = backend();

        assert!(vcs.pull(&work, "origin", &main_branch()).is_err());
        assert!(vcs.operation_in_progress(&work).unwrap());

        vcs.abort_operation(&work).unwrap();
        assert!(!vcs.operation_in_progress(&work).unwrap());
        assert!(!vcs.is_dirty(&work).unwrap());
        assert_eq!(git_stdout(&work, &["rev-parse", "HEAD"]), ours);
    }

    #[test]
    fn abort_without_operation_is_noop() {
        let remote = TestRemote::new();
        let work = remote.clone("work");

        backend().abort_operation(&work).unwrap();
    }

    #[test]
    fn rejected_push_fails() {
        let remote = TestRemote::new();
        let work = remote.clone("work");
        let other = remote.clone("other");
        commit_file(&other, "a.txt", "a\n", "theirs");
        run_git(&other, &["push", "-q", "origin", "main"]);
        commit_file(&work, "b.txt", "b\n", "ours");

        let result = backend().push(&work, "origin", &main_branch());
        assert!(matches!(result, Err(GitError::CommandFailed { .. })));
    }

    #[test]
    fn metadata_dir_points_at_git_dir() {
        let remote = TestRemote::new();
        let work = remote.clone("work");

        let dir = backend().metadata_dir(&work).unwrap();
        assert_eq!(
            dir.canonicalize().unwrap(),
            work.join(".git").canonicalize().unwrap()
        );
    }
}
