//! Status command - show persisted review state

use chrono::{DateTime, Utc};
use revd_core::{Config, StateStore};

pub fn execute(config: &Config) {
    let state = StateStore::load(&config.paths.state_file);
    print!("{}", render(&state, Utc::now()));
}

fn render(state: &StateStore, now: DateTime<Utc>) -> String {
    let mut out = format!("State file: {}\n", state.path().display());
    let repos = &state.data().repos;

    if repos.is_empty() {
        out.push_str("\nNo repositories tracked yet.\n");
        return out;
    }

    for (name, repo) in repos {
        out.push('\n');
        match repo.etag {
            Some(ref etag) => out.push_str(&format!("{} (etag {})\n", name, etag)),
            None => out.push_str(&format!("{}\n", name)),
        }

        if repo.prs.is_empty() {
            out.push_str("  no open PRs recorded\n");
        }
        for (number, pr) in &repo.prs {
            let short: String = pr.head_sha.chars().take(7).collect();
            out.push_str(&format!(
                "  #{:<6} {:<8} {:<12} {}\n",
                number,
                short,
                pr.review_status.to_string(),
                format_age((now - pr.reviewed_at).num_seconds())
            ));
        }
    }

    out
}

/// Format elapsed seconds as a short "ago" string
fn format_age(seconds: i64) -> String {
    if seconds < 60 {
        format!("{}s ago", seconds.max(0))
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{}h ago", seconds / 3600)
    } else {
        format!("{}d ago", seconds / 86400)
    }
}
