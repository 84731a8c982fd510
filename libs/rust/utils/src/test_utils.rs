use chrono::NaiveDateTime;
use envoy_db::models::proposal;

pub struct ExpectedProposal {
    pub title: &'static str,
    pub protocol: &'static str,
    pub kind: &'static str,
    pub vote_type: &'static str,
    pub options: &'static str,
    pub date_added: &'static str,
    pub date_expiry: Option<&'static str>,
    pub vote_url: &'static str,
    pub forum_url: &'static str,
}

/// Compares a stored row against its expected values. Timestamps use `%Y-%m-%d %H:%M:%S` (UTC).
pub fn assert_proposal(proposal: &proposal::Model, expected: &ExpectedProposal) {
    assert_eq!(proposal.title, expected.title, "Proposal title does not match");
    assert_eq!(
        proposal.protocol, expected.protocol,
        "Proposal protocol does not match"
    );
    assert_eq!(proposal.kind, expected.kind, "Proposal kind does not match");
    assert_eq!(
        proposal.vote_type, expected.vote_type,
        "Vote type does not match"
    );
    assert_eq!(
        proposal.options.to_string(),
        expected.options,
        "Options do not match"
    );

    let expected_date_added =
        NaiveDateTime::parse_from_str(expected.date_added, "%Y-%m-%d %H:%M:%S").unwrap();
    assert_eq!(
        proposal.date_added, expected_date_added,
        "Date added does not match"
    );

    let expected_date_expiry = expected
        .date_expiry
        .map(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap());
    assert_eq!(
        proposal.date_expiry, expected_date_expiry,
        "Date expiry does not match"
    );

    assert_eq!(proposal.vote_url, expected.vote_url, "Vote URL does not match");
    assert_eq!(
        proposal.forum_url, expected.forum_url,
        "Forum URL does not match"
    );
}
