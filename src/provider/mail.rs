//! New-mail indicator based on the system mailbox timestamps.
//!
//! A mailbox has unread mail when it was modified after it was last read,
//! i.e. its mtime is later than its atime.

use crate::config::{MAIL_COLOR, MAIL_INTERVAL, MAIL_TEXT, NORMAL_COLOR};
use crate::error::{Result, StatusError};
use crate::provider::{Provider, Registration, WatchSpec};
use log::debug;
use nix::unistd::{Uid, User};
use std::fs::File;
use std::path::{Path, PathBuf};

pub struct MailProvider {
    mailbox: File,
    path: PathBuf,
}

impl MailProvider {
    /// Open `<spool_dir>/<login name>` and watch it for deliveries and reads.
    pub fn init(spool_dir: &Path) -> Result<Registration> {
        let user = User::from_uid(Uid::current())
            .map_err(|err| StatusError::unavailable("login name", err))?
            .ok_or_else(|| StatusError::unavailable("login name", "no passwd entry"))?;
        let provider = Self::open(spool_dir.join(user.name))?;
        let path = provider.path.clone();
        Ok(Registration::new(provider)
            .watch(WatchSpec::FileAccess(path))
            .watch(WatchSpec::Every(MAIL_INTERVAL)))
    }

    /// Open a specific mailbox file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mailbox = File::open(&path)
            .map_err(|err| StatusError::unavailable(path.display().to_string(), err))?;
        debug!("watching mailbox {}", path.display());
        Ok(Self { mailbox, path })
    }
}

impl Provider for MailProvider {
    fn query(&mut self) -> Result<Option<String>> {
        let meta = self
            .mailbox
            .metadata()
            .map_err(|err| StatusError::io("cannot get mail box status", err))?;
        let modified = meta
            .modified()
            .map_err(|err| StatusError::io("mail box has no mtime", err))?;
        let accessed = meta
            .accessed()
            .map_err(|err| StatusError::io("mail box has no atime", err))?;

        if modified > accessed {
            Ok(Some(format!("{MAIL_COLOR}{MAIL_TEXT}{NORMAL_COLOR}")))
        } else {
            Ok(None)
        }
    }
}
