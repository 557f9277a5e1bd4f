//! Lightweight unified-diff summary used for prompts and the heuristic engine.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeKind {
    /// Single-letter git status code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Added => "A",
            Self::Modified => "M",
            Self::Deleted => "D",
            Self::Renamed => "R",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub kind: ChangeKind,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub files: Vec<ChangedFile>,
    pub insertions: usize,
    pub deletions: usize,
}

impl DiffSummary {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.insertions == 0 && self.deletions == 0
    }
}

/// Summarizes `git diff` output as well as plain `diff -u` output.
pub fn summarize(diff: &str) -> DiffSummary {
    let mut summary = DiffSummary::default();
    let mut in_hunk = false;
    let mut lines = diff.lines().peekable();

    while let Some(line) = lines.next() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            in_hunk = false;
            let path = rest
                .split(" b/")
                .nth(1)
                .map(str::to_string)
                .unwrap_or_else(|| rest.trim_start_matches("a/").to_string());
            summary.files.push(ChangedFile {
                kind: ChangeKind::Modified,
                path,
            });
            continue;
        }

        let is_file_header = line.starts_with("--- ")
            && lines.peek().is_some_and(|next| next.starts_with("+++ "));

        if is_file_header {
            in_hunk = false;
            let old = strip_side(&line[4..]);
            let new = lines.next().map(|l| strip_side(&l[4..])).unwrap_or_default();
            apply_file_header(&mut summary, old, new);
            continue;
        }

        if line.starts_with("@@") {
            in_hunk = true;
            continue;
        }

        if !in_hunk {
            if let Some(last) = summary.files.last_mut() {
                if line.starts_with("new file mode") {
                    last.kind = ChangeKind::Added;
                } else if line.starts_with("deleted file mode") {
                    last.kind = ChangeKind::Deleted;
                } else if let Some(to) = line.strip_prefix("rename to ") {
                    last.kind = ChangeKind::Renamed;
                    last.path = to.to_string();
                }
            }
            continue;
        }

        if line.starts_with('+') {
            summary.insertions += 1;
        } else if line.starts_with('-') {
            summary.deletions += 1;
        }
    }

    summary
}

fn strip_side(path: &str) -> String {
    // drop the timestamp `diff -u` appends after a tab
    let path = path.split('\t').next().unwrap_or(path).trim();
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
        .to_string()
}

fn apply_file_header(summary: &mut DiffSummary, old: String, new: String) {
    const DEV_NULL: &str = "/dev/null";

    // git diffs already opened the entry in the `diff --git` line
    if let Some(last) = summary.files.last_mut() {
        let same_file = last.path == new || (new == DEV_NULL && last.path == old);
        if same_file {
            if old == DEV_NULL {
                last.kind = ChangeKind::Added;
            } else if new == DEV_NULL {
                last.kind = ChangeKind::Deleted;
            }
            return;
        }
    }

    let (kind, path) = if old == DEV_NULL {
        (ChangeKind::Added, new)
    } else if new == DEV_NULL {
        (ChangeKind::Deleted, old)
    } else {
        (ChangeKind::Modified, new)
    };
    summary.files.push(ChangedFile { kind, path });
}
