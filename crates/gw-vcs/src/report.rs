// report.rs — Per-reference outcomes of fetch and push.
//
// git reports one line per updated reference, prefixed with a single flag
// character. Push is run with --porcelain (tab-separated on stdout); fetch
// prints its summary table on stderr. Both are parsed into RefUpdate values
// so callers can decide on rejection without looking at text.

use std::sync::OnceLock;

use regex::Regex;

/// Outcome of updating a single reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefUpdateFlag {
    FastForward,
    Forced,
    New,
    Deleted,
    TagUpdate,
    UpToDate,
    Rejected,
    /// The reference could not be updated for another reason.
    Error,
}

impl RefUpdateFlag {
    fn from_push_flag(flag: char) -> Self {
        match flag {
            ' ' => RefUpdateFlag::FastForward,
            '+' => RefUpdateFlag::Forced,
            '-' => RefUpdateFlag::Deleted,
            '*' => RefUpdateFlag::New,
            '=' => RefUpdateFlag::UpToDate,
            '!' => RefUpdateFlag::Rejected,
            _ => RefUpdateFlag::Error,
        }
    }

    fn from_fetch_flag(flag: char) -> Self {
        match flag {
            't' => RefUpdateFlag::TagUpdate,
            other => Self::from_push_flag(other),
        }
    }

    /// Whether this outcome makes the whole operation a rejection.
    pub fn is_failure(&self) -> bool {
        matches!(self, RefUpdateFlag::Rejected | RefUpdateFlag::Error)
    }
}

/// One reference line of a fetch or push report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub flag: RefUpdateFlag,
    /// Local side of the refspec (empty for deletions)
    pub source: String,
    /// Reference that was (or was not) updated
    pub destination: String,
    /// Human-readable summary, e.g. `[rejected] (non-fast-forward)`
    pub summary: String,
}

/// Result of a push.
#[derive(Debug, Clone, Default)]
pub struct PushReport {
    pub updates: Vec<RefUpdate>,
}

impl PushReport {
    /// References the remote refused or failed to update.
    pub fn failures(&self) -> impl Iterator<Item = &RefUpdate> {
        self.updates.iter().filter(|u| u.flag.is_failure())
    }

    /// All-or-nothing: accepted only when every reference went through.
    pub fn is_accepted(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Result of a fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub updates: Vec<RefUpdate>,
    /// Diagnostic lines, one per reference; not meant to be parsed.
    pub notes: Vec<String>,
}

impl FetchReport {
    pub fn failures(&self) -> impl Iterator<Item = &RefUpdate> {
        self.updates.iter().filter(|u| u.flag.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Parse `git push --porcelain` stdout.
///
/// Reference lines look like `<flag>\t<src>:<dst>\t<summary>`; the `To`
/// header and `Done` trailer are skipped.
pub fn parse_push_porcelain(stdout: &str) -> PushReport {
    let updates = stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, '\t');
            let flag = fields.next()?;
            let refspec = fields.next()?;
            let summary = fields.next()?;

            let mut chars = flag.chars();
            let flag = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            let (source, destination) = refspec.split_once(':')?;
            Some(RefUpdate {
                flag: RefUpdateFlag::from_push_flag(flag),
                source: source.to_string(),
                destination: destination.to_string(),
                summary: summary.trim().to_string(),
            })
        })
        .collect();
    PushReport { updates }
}

fn fetch_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^ (.) (\[[^\]]*\]|\S+)\s+(\S+)\s+-> (\S+)(?:\s+\((.+)\))?\s*$")
            .expect("static regex is valid")
    })
}

/// Parse the reference table `git fetch -v` prints on stderr.
pub fn parse_fetch_output(stderr: &str) -> FetchReport {
    let mut report = FetchReport::default();

    for line in stderr.lines() {
        let Some(caps) = fetch_line_regex().captures(line) else {
            continue;
        };
        let flag = caps[1].chars().next().unwrap_or('?');
        let mut summary = caps[2].to_string();
        if let Some(reason) = caps.get(5) {
            summary = format!("{} ({})", summary, reason.as_str());
        }

        report.updates.push(RefUpdate {
            flag: RefUpdateFlag::from_fetch_flag(flag),
            source: caps[3].to_string(),
            destination: caps[4].to_string(),
            summary,
        });
        report.notes.push(line.trim().to_string());
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_new_branch_is_accepted() {
        let out = "To /tmp/remote.git\n*\trefs/heads/master:refs/heads/master\t[new branch]\nDone\n";
        let report = parse_push_porcelain(out);
        assert_eq!(report.updates.len(), 1);
        assert_eq!(report.updates[0].flag, RefUpdateFlag::New);
        assert_eq!(report.updates[0].destination, "refs/heads/master");
        assert!(report.is_accepted());
    }

    #[test]
    fn push_rejection_taints_whole_report() {
        let out = concat!(
            "To origin\n",
            " \trefs/heads/dev:refs/heads/dev\t1111111..2222222\n",
            "!\trefs/heads/master:refs/heads/master\t[rejected] (non-fast-forward)\n",
            "Done\n",
        );
        let report = parse_push_porcelain(out);
        assert_eq!(report.updates.len(), 2);
        assert_eq!(report.updates[0].flag, RefUpdateFlag::FastForward);
        assert!(!report.is_accepted());
        let failed: Vec<_> = report.failures().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].summary, "[rejected] (non-fast-forward)");
    }

    #[test]
    fn push_deletion_has_empty_source() {
        let report = parse_push_porcelain("-\t:refs/heads/old\t[deleted]\n");
        assert_eq!(report.updates[0].flag, RefUpdateFlag::Deleted);
        assert_eq!(report.updates[0].source, "");
    }

    #[test]
    fn fetch_table_is_parsed() {
        let err = "From /tmp/remote\n \
                   * [new branch]      master     -> origin/master\n \
                   + 1234567...89abcde dev        -> origin/dev  (forced update)\n \
                   = [up to date]      main       -> origin/main\n";
        let report = parse_fetch_output(err);
        assert_eq!(report.updates.len(), 3);
        assert_eq!(report.updates[0].flag, RefUpdateFlag::New);
        assert_eq!(report.updates[0].destination, "origin/master");
        assert_eq!(report.updates[1].flag, RefUpdateFlag::Forced);
        assert_eq!(report.updates[1].summary, "1234567...89abcde (forced update)");
        assert_eq!(report.updates[2].flag, RefUpdateFlag::UpToDate);
        assert_eq!(report.notes.len(), 3);
        assert_eq!(report.notes[0], "* [new branch]      master     -> origin/master");
        assert!(!report.has_failures());
    }

    #[test]
    fn fetch_rejection_is_a_failure() {
        let err = " ! [rejected]        v1.0       -> v1.0  (would clobber existing tag)\n";
        let report = parse_fetch_output(err);
        assert!(report.has_failures());
        assert_eq!(report.updates[0].source, "v1.0");
    }

    #[test]
    fn fetch_ignores_unrelated_lines() {
        let report = parse_fetch_output("POST git-upload-pack (175 bytes)\nFrom https://example.com/r\n");
        assert!(report.updates.is_empty());
        assert!(report.notes.is_empty());
    }
}
