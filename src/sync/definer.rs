// shopsync/src/sync/definer.rs
//! Definer-clause stripping. Dumps from differently-provisioned servers bind
//! views, triggers and routines to users that do not exist locally; both the
//! versioned-comment form and the bare form are removed. The remote side runs
//! sed inside the dump pipeline, the local side applies equivalent regexes
//! while streaming the dump into the client.

use std::io::{BufRead, Write};

use regex::Regex;

use crate::process::Invocation;

/// `/*!50017 DEFINER=`user`@`host`*/` -> removed entirely.
const SED_VERSIONED_COMMENT: &str = r"s#/\*![0-9]* DEFINER=[^*]*\*/##g";
/// `DEFINER=`user`@`host` ` -> collapsed to a single space.
const SED_BARE: &str = "s#DEFINER=[^ ]* # #g";

/// The sed stage used inside remote dump pipelines.
pub fn sed_invocation() -> Invocation {
    Invocation::new("sed").args(["-e", SED_VERSIONED_COMMENT, "-e", SED_BARE])
}

pub struct DefinerFilter {
    versioned_comment: Regex,
    bare: Regex,
}

impl DefinerFilter {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(DefinerFilter {
            versioned_comment: Regex::new(r"/\*!\d+ DEFINER=[^*]*\*/")?,
            bare: Regex::new(r"DEFINER=[^ ]+ ")?,
        })
    }

    pub fn strip_line(&self, line: &str) -> String {
        let line = self.versioned_comment.replace_all(line, "");
        self.bare.replace_all(&line, " ").into_owned()
    }

    /// Streams `reader` line by line through the filter into `writer`.
    pub fn copy_filtered<R: BufRead, W: Write + ?Sized>(
        &self,
        reader: R,
        writer: &mut W,
    ) -> std::io::Result<u64> {
        let mut lines = 0u64;
        for line in reader.lines() {
            writeln!(writer, "{}", self.strip_line(&line?))?;
            lines += 1;
        }
        Ok(lines)
    }
}
