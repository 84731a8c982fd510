use crate::proposal::{Proposal, ProposalKind};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write;

pub const NEW_PROPOSALS_HEADER: &str = "📣 New proposals";
const EXPIRING_HEADER: &str = "❗❗ Expiring Soon";

fn display_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(date) => date.format("%a, %d %b %Y %H:%M:%S UTC").to_string(),
        None => "unknown".to_string(),
    }
}

/// Announcement for a newly recorded proposal. Polls also list their mechanism and choices.
pub fn proposal_message(proposal: &Proposal) -> String {
    let mut message = format!(
        "{}\n\nType: {}\n",
        proposal.title,
        proposal.kind.label()
    );

    if proposal.kind == ProposalKind::Poll {
        let _ = writeln!(message, "Vote Type: {}", proposal.vote_type);
        let _ = writeln!(message, "Options: {}", proposal.options.join(","));
    }

    let _ = writeln!(message, "Date Added: {}", display_date(Some(proposal.date_added)));
    let _ = writeln!(message, "Expiry date: {}", display_date(proposal.date_expiry));
    let _ = write!(message, "Vote URL: {}", proposal.vote_url);

    if proposal.kind == ProposalKind::Poll {
        let _ = write!(message, "\nForum URL: {}", proposal.forum_url);
    }

    message
}

pub fn expiring_digest(proposals: &[Proposal]) -> String {
    let mut message = format!("{EXPIRING_HEADER}\n\n");
    for proposal in proposals {
        let _ = write!(
            message,
            "{}\nExpiry date: {}\nVote URL: {}\n\n",
            proposal.title,
            display_date(proposal.date_expiry),
            proposal.vote_url
        );
    }
    message
}

pub fn error_message(origin: &str, at: DateTime<Utc>, error: &str) -> String {
    format!(
        "⚠️ Error\nOrigin: {origin}\nDate: {}\nError: {error}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::Protocol;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn poll() -> Proposal {
        Proposal {
            title: "Stability Fee Changes".to_string(),
            protocol: Protocol::MakerDAO,
            kind: ProposalKind::Poll,
            vote_type: "Ranked Choice".to_string(),
            options: vec!["Abstain".to_string(), "Yes".to_string(), "No".to_string()],
            date_added: at("2024-03-04T16:00:00Z"),
            date_expiry: Some(at("2024-03-07T16:00:00Z")),
            date_executed: None,
            vote_url: "https://vote.makerdao.com/polling/QmWReBMh".to_string(),
            forum_url: "https://forum.makerdao.com/t/23733".to_string(),
        }
    }

    #[test]
    fn formats_poll_with_options_and_forum() {
        assert_eq!(
            proposal_message(&poll()),
            "Stability Fee Changes\n\n\
             Type: Poll\n\
             Vote Type: Ranked Choice\n\
             Options: Abstain,Yes,No\n\
             Date Added: Mon, 04 Mar 2024 16:00:00 UTC\n\
             Expiry date: Thu, 07 Mar 2024 16:00:00 UTC\n\
             Vote URL: https://vote.makerdao.com/polling/QmWReBMh\n\
             Forum URL: https://forum.makerdao.com/t/23733"
        );
    }

    #[test]
    fn formats_other_kinds_without_poll_lines() {
        let mut exec = poll();
        exec.kind = ProposalKind::ExecutiveProposal;
        exec.date_expiry = None;

        let message = proposal_message(&exec);
        assert!(message.contains("Type: Executive Proposal\n"));
        assert!(message.contains("Expiry date: unknown\n"));
        assert!(!message.contains("Options:"));
        assert!(!message.contains("Forum URL:"));
        assert!(message.ends_with("Vote URL: https://vote.makerdao.com/polling/QmWReBMh"));
    }

    #[test]
    fn arbitrum_proposals_are_typed_as_aip() {
        let mut aip = poll();
        aip.protocol = Protocol::Arbitrum;
        aip.kind = ProposalKind::OnChainProposal;

        let message = proposal_message(&aip);
        assert!(message.starts_with("Stability Fee Changes\n\nType: AIP\nDate Added: "));
    }

    #[test]
    fn digest_lists_each_proposal() {
        let digest = expiring_digest(&[poll()]);
        assert_eq!(
            digest,
            "❗❗ Expiring Soon\n\n\
             Stability Fee Changes\n\
             Expiry date: Thu, 07 Mar 2024 16:00:00 UTC\n\
             Vote URL: https://vote.makerdao.com/polling/QmWReBMh\n\n"
        );
    }

    #[test]
    fn formats_error_report() {
        assert_eq!(
            error_message("Aave", at("2024-03-04T16:00:00Z"), "timed out"),
            "⚠️ Error\nOrigin: Aave\nDate: 2024-03-04T16:00:00Z\nError: timed out"
        );
    }
}
