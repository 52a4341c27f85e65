// tests/temp_artifacts.rs

use std::collections::HashSet;
use std::error::Error;
use std::fs;

use wsrun::exec::TempArtifactManager;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn directory_is_created_lazily_and_reused() -> TestResult {
    let base = tempfile::tempdir()?;
    let manager = TempArtifactManager::with_base_dir(base.path());

    assert_eq!(fs::read_dir(base.path())?.count(), 0, "nothing before first use");

    let first = manager.dir()?;
    let second = manager.dir()?;
    assert_eq!(first, second);
    assert!(first.starts_with(base.path()));
    assert!(first.is_dir());
    Ok(())
}

#[test]
fn artifacts_get_unique_names_and_contents() -> TestResult {
    let base = tempfile::tempdir()?;
    let manager = TempArtifactManager::with_base_dir(base.path());

    let artifacts: Vec<_> = (0..20)
        .map(|i| manager.create_artifact(".sh", &format!("echo {i}\n"), true))
        .collect::<Result<_, _>>()?;

    let names: HashSet<_> = artifacts.iter().map(|a| a.path().to_path_buf()).collect();
    assert_eq!(names.len(), artifacts.len());

    for (i, artifact) in artifacts.iter().enumerate() {
        assert_eq!(fs::read_to_string(artifact.path())?, format!("echo {i}\n"));
        assert!(artifact.path().to_string_lossy().ends_with(".sh"));
    }
    assert_eq!(manager.live_artifacts().len(), 20);
    Ok(())
}

#[cfg(unix)]
#[test]
fn executable_artifacts_are_0755() -> TestResult {
    use std::os::unix::fs::PermissionsExt;

    let base = tempfile::tempdir()?;
    let manager = TempArtifactManager::with_base_dir(base.path());
    let artifact = manager.create_artifact(".sh", "true\n", true)?;

    let mode = fs::metadata(artifact.path())?.permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
    Ok(())
}

#[test]
fn cleanup_is_idempotent() -> TestResult {
    let base = tempfile::tempdir()?;
    let manager = TempArtifactManager::with_base_dir(base.path());
    let artifact = manager.create_artifact(".sh", "true\n", false)?;
    let path = artifact.path().to_path_buf();

    artifact.cleanup();
    assert!(!path.exists());
    assert!(artifact.is_cleaned());
    assert!(manager.live_artifacts().is_empty());

    // A second call (and the drop after it) must not fail.
    artifact.cleanup();
    drop(artifact);
    assert!(!path.exists());
    Ok(())
}

#[test]
fn cleanup_tolerates_externally_removed_files() -> TestResult {
    let base = tempfile::tempdir()?;
    let manager = TempArtifactManager::with_base_dir(base.path());
    let artifact = manager.create_artifact(".sh", "true\n", false)?;

    fs::remove_file(artifact.path())?;
    artifact.cleanup();
    assert!(artifact.is_cleaned());
    Ok(())
}

#[test]
fn dropping_an_artifact_removes_it() -> TestResult {
    let base = tempfile::tempdir()?;
    let manager = TempArtifactManager::with_base_dir(base.path());
    let path = manager.create_artifact(".sh", "true\n", false)?.path().to_path_buf();

    assert!(!path.exists());
    Ok(())
}

#[test]
fn purge_removes_leftovers_and_directory() -> TestResult {
    let base = tempfile::tempdir()?;
    let manager = TempArtifactManager::with_base_dir(base.path());
    let artifact = manager.create_artifact(".sh", "true\n", false)?;
    let dir = manager.dir()?;

    manager.purge();
    assert!(!artifact.path().exists());
    assert!(!dir.exists());
    assert!(manager.live_artifacts().is_empty());

    // The directory comes back on the next use.
    let again = manager.create_artifact(".sh", "true\n", false)?;
    assert!(again.path().exists());
    assert_ne!(manager.dir()?, dir);
    Ok(())
}

#[test]
fn dropping_the_manager_removes_its_directory() -> TestResult {
    let base = tempfile::tempdir()?;
    let dir = {
        let manager = TempArtifactManager::with_base_dir(base.path());
        let artifact = manager.create_artifact(".sh", "true\n", false)?;
        std::mem::forget(artifact);
        manager.dir()?
    };

    assert!(!dir.exists());
    Ok(())
}
