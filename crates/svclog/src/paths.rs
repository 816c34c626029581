use std::path::{Path, PathBuf};

/// `<log_dir>/<service>.log`
pub fn active_log_path(log_dir: &Path, service: &str) -> PathBuf {
	log_dir.join(format!("{}.log", service))
}

/// `<active>.<index>`; index 1 is the most recent backup.
pub fn backup_log_path(active: &Path, index: u32) -> PathBuf {
	let mut name = active.as_os_str().to_owned();
	name.push(format!(".{}", index));
	PathBuf::from(name)
}

/// The unrotated copy kept in the temp directory.
pub fn tmp_log_path(tmp_dir: &Path, service: &str) -> PathBuf {
	tmp_dir.join(format!("{}.log", service))
}

/// Active file plus every backup index that currently exists, up to `max_backups`.
pub fn existing_log_files(active: &Path, max_backups: u32) -> Vec<PathBuf> {
	std::iter::once(active.to_path_buf())
		.chain((1..=max_backups).map(|i| backup_log_path(active, i)))
		.filter(|p| p.exists())
		.collect()
}
