use crate::{
    config::SourcesConfig,
    errors::MappingError,
    models::{AaveRawProposal, ArbitrumRawProposal, MakerRawExecutive, MakerRawPoll, RawRecord},
    proposal::{Proposal, ProposalKind, Protocol},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

static SLUG_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_]").unwrap());
static SLUG_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.,/#!$%^&*;:{}=`~()'’"?\[\]<>|+@\\]"#).unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const EXECUTIVE_VOTE_TYPE: &str = "Executive Proposal";
const ARBITRUM_VOTE_TYPE: &str = "AIP";
const AAVE_OPTIONS: [&str; 2] = ["Yae", "Nay"];

/// Result of normalizing one protocol's raw records.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub proposals: Vec<Proposal>,
    /// Mapping failures and in-batch duplicate titles.
    pub rejected: Vec<String>,
}

/// Maps raw upstream records onto [`Proposal`]. Pure: no I/O, no clock.
#[derive(Debug, Clone)]
pub struct Normalizer {
    maker_base: String,
    aave_base: String,
    tally_web: String,
}

impl Normalizer {
    pub fn new(sources: &SourcesConfig) -> Self {
        Self::with_bases(
            &sources.maker_base_url,
            &sources.aave_base_url,
            &sources.tally_web_url,
        )
    }

    pub fn with_bases(maker_base: &str, aave_base: &str, tally_web: &str) -> Self {
        Self {
            maker_base: maker_base.trim_end_matches('/').to_string(),
            aave_base: aave_base.trim_end_matches('/').to_string(),
            tally_web: tally_web.trim_end_matches('/').to_string(),
        }
    }

    pub fn normalize(&self, raw: &RawRecord) -> Result<Proposal, MappingError> {
        let proposal = match raw {
            RawRecord::MakerPoll(poll) => self.maker_poll(poll)?,
            RawRecord::MakerExecutive(exec) => self.maker_executive(exec)?,
            RawRecord::Aave(aave) => self.aave(aave)?,
            RawRecord::Arbitrum(arb) => self.arbitrum(arb)?,
            RawRecord::Undecodable { source, error, .. } => {
                return Err(MappingError::invalid(source.protocol(), "record", error.clone()));
            }
        };
        validate(proposal)
    }

    /// Normalizes every record, keeping the first occurrence of each title.
    pub fn normalize_batch(&self, raws: &[RawRecord]) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        let mut titles = HashSet::new();

        for raw in raws {
            match self.normalize(raw) {
                Ok(proposal) => {
                    if titles.insert(proposal.title.clone()) {
                        batch.proposals.push(proposal);
                    } else {
                        warn!(
                            protocol = %proposal.protocol,
                            title = %proposal.title,
                            "Dropping duplicate title within batch"
                        );
                        batch
                            .rejected
                            .push(format!("duplicate title `{}`", proposal.title));
                    }
                }
                Err(err) => {
                    warn!(
                        source = %raw.source(),
                        title = raw.title_hint().unwrap_or("<untitled>"),
                        error = %err,
                        "Skipping record that failed to normalize"
                    );
                    batch.rejected.push(match raw.title_hint() {
                        Some(title) => format!("`{title}`: {err}"),
                        None => err.to_string(),
                    });
                }
            }
        }

        batch
    }

    fn maker_poll(&self, poll: &MakerRawPoll) -> Result<Proposal, MappingError> {
        let protocol = Protocol::MakerDAO;
        let title = required_text(protocol, "title", poll.title.as_deref())?;
        let slug = required_text(protocol, "slug", poll.slug.as_deref())?;
        let input_type = poll
            .parameters
            .as_ref()
            .and_then(|p| p.input_format.as_ref())
            .and_then(|f| f.input_type.as_deref())
            .ok_or_else(|| MappingError::missing(protocol, "parameters.inputFormat.type"))?;

        let options = poll
            .options
            .as_ref()
            .map(|map| map.values().map(option_label).collect())
            .unwrap_or_default();

        Ok(Proposal {
            title,
            protocol,
            kind: ProposalKind::Poll,
            vote_type: vote_type_label(input_type),
            options,
            date_added: required_time(protocol, "startDate", poll.start_date.as_deref())?,
            date_expiry: optional_time(protocol, "endDate", poll.end_date.as_deref())?,
            date_executed: None,
            vote_url: format!("{}/polling/{}", self.maker_base, slug),
            forum_url: poll.discussion_link.clone().unwrap_or_default(),
        })
    }

    fn maker_executive(&self, exec: &MakerRawExecutive) -> Result<Proposal, MappingError> {
        let protocol = Protocol::MakerDAO;
        let title = required_text(protocol, "title", exec.title.as_deref())?;
        let spell = exec.spell_data.as_ref();

        let date_added = match spell.and_then(|s| s.date_passed.as_deref()) {
            Some(passed) => parse_field(protocol, "spellData.datePassed", passed)?,
            None => required_time(protocol, "date", exec.date.as_deref())?,
        };

        Ok(Proposal {
            vote_url: format!(
                "{}/executive/template-executive-vote-{}#proposal-detail",
                self.maker_base,
                slugify(&title)
            ),
            title,
            protocol,
            kind: ProposalKind::ExecutiveProposal,
            vote_type: EXECUTIVE_VOTE_TYPE.to_string(),
            options: vec![String::new()],
            date_added,
            date_expiry: optional_time(
                protocol,
                "spellData.expiration",
                spell.and_then(|s| s.expiration.as_deref()),
            )?,
            date_executed: optional_time(
                protocol,
                "spellData.dateExecuted",
                spell.and_then(|s| s.date_executed.as_deref()),
            )?,
            forum_url: String::new(),
        })
    }

    fn aave(&self, raw: &AaveRawProposal) -> Result<Proposal, MappingError> {
        let protocol = Protocol::Aave;
        let ipfs = raw.ipfs.as_ref();
        let onchain = raw.proposal.as_ref();

        let title = required_text(protocol, "ipfs.title", ipfs.and_then(|i| i.title.as_deref()))?;
        let id = ipfs
            .and_then(|i| i.id)
            .or_else(|| onchain.and_then(|p| p.id))
            .ok_or_else(|| MappingError::missing(protocol, "ipfs.id"))?;

        let created = onchain
            .and_then(|p| p.creation_timestamp.or(p.start_timestamp))
            .ok_or_else(|| MappingError::missing(protocol, "proposal.creationTimestamp"))?;
        let date_added = from_epoch(protocol, "proposal.creationTimestamp", created)?;

        let date_expiry = match onchain.and_then(|p| p.expiration_timestamp) {
            None | Some(0) => None,
            Some(secs) => Some(from_epoch(protocol, "proposal.expirationTimestamp", secs)?),
        };

        Ok(Proposal {
            title,
            protocol,
            kind: ProposalKind::ExecutiveProposal,
            vote_type: EXECUTIVE_VOTE_TYPE.to_string(),
            options: AAVE_OPTIONS.iter().map(|o| o.to_string()).collect(),
            date_added,
            date_expiry,
            date_executed: None,
            vote_url: format!("{}/governance/proposal/?proposalId={}", self.aave_base, id),
            forum_url: String::new(),
        })
    }

    fn arbitrum(&self, raw: &ArbitrumRawProposal) -> Result<Proposal, MappingError> {
        let protocol = Protocol::Arbitrum;
        let id = required_text(protocol, "id", raw.id.as_deref())?;
        let title = required_text(protocol, "title", raw.title.as_deref())?;

        let created = raw
            .created_transaction
            .as_ref()
            .and_then(|t| t.block.as_ref())
            .and_then(|b| b.timestamp.as_deref())
            .or_else(|| raw.start.as_ref().and_then(|s| s.timestamp.as_deref()));
        let date_added = required_time(protocol, "createdTransaction.block.timestamp", created)?;
        let date_expiry = optional_time(
            protocol,
            "end.timestamp",
            raw.end.as_ref().and_then(|e| e.timestamp.as_deref()),
        )?;

        let mut options: Vec<String> = Vec::new();
        for support in raw
            .vote_stats
            .iter()
            .flatten()
            .filter_map(|stat| stat.support.as_deref())
        {
            if !options.iter().any(|o| o == support) {
                options.push(support.to_string());
            }
        }

        Ok(Proposal {
            title,
            protocol,
            kind: ProposalKind::OnChainProposal,
            vote_type: ARBITRUM_VOTE_TYPE.to_string(),
            options,
            date_added,
            date_expiry,
            date_executed: None,
            vote_url: format!("{}/gov/arbitrum/proposal/{}", self.tally_web, id),
            forum_url: String::new(),
        })
    }
}

fn validate(proposal: Proposal) -> Result<Proposal, MappingError> {
    if let Some(expiry) = proposal.date_expiry {
        if proposal.date_added > expiry {
            return Err(MappingError::invalid(
                proposal.protocol,
                "dateExpiry",
                format!("expiry {expiry} precedes date added {}", proposal.date_added),
            ));
        }
    }

    match Url::parse(&proposal.vote_url) {
        Ok(_) => Ok(proposal),
        Err(err) => Err(MappingError::invalid(
            proposal.protocol,
            "voteUrl",
            format!("`{}`: {err}", proposal.vote_url),
        )),
    }
}

/// `ranked-choice` becomes `Ranked Choice`.
pub fn vote_type_label(input_type: &str) -> String {
    input_type
        .split('-')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hyphenated lowercase slug used by Maker executive pages.
pub fn slugify(title: &str) -> String {
    let spaced = SLUG_SEPARATORS.replace_all(title, " ");
    let stripped = SLUG_PUNCTUATION.replace_all(&spaced, "");
    WHITESPACE
        .replace_all(stripped.trim(), " ")
        .to_lowercase()
        .replace(' ', "-")
}

/// Accepts RFC 3339, RFC 2822, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`, all read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn option_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn required_text(
    protocol: Protocol,
    field: &'static str,
    value: Option<&str>,
) -> Result<String, MappingError> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(MappingError::missing(protocol, field)),
    }
}

fn parse_field(
    protocol: Protocol,
    field: &'static str,
    value: &str,
) -> Result<DateTime<Utc>, MappingError> {
    parse_timestamp(value)
        .ok_or_else(|| MappingError::invalid(protocol, field, format!("unparseable timestamp `{value}`")))
}

fn required_time(
    protocol: Protocol,
    field: &'static str,
    value: Option<&str>,
) -> Result<DateTime<Utc>, MappingError> {
    match value {
        Some(v) => parse_field(protocol, field, v),
        None => Err(MappingError::missing(protocol, field)),
    }
}

fn optional_time(
    protocol: Protocol,
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, MappingError> {
    value.map(|v| parse_field(protocol, field, v)).transpose()
}

fn from_epoch(
    protocol: Protocol,
    field: &'static str,
    secs: i64,
) -> Result<DateTime<Utc>, MappingError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| MappingError::invalid(protocol, field, format!("epoch {secs} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        aave::{AaveIpfs, AaveOnChain},
        maker::{MakerInputFormat, MakerPollParameters, MakerSpellData},
        tally::{TallyTimestamp, TallyTransaction, TallyVoteStat},
        SourceKind,
    };
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::with_bases(
            "https://vote.makerdao.com",
            "https://app.aave.com/",
            "https://www.tally.xyz",
        )
    }

    fn maker_poll() -> MakerRawPoll {
        serde_json::from_value(json!({
            "pollId": 1107,
            "title": "Ratification Poll for Stability Fee Changes",
            "slug": "QmWReBMh",
            "startDate": "2024-03-04T16:00:00.000Z",
            "endDate": "2024-03-07T16:00:00.000Z",
            "parameters": { "inputFormat": { "type": "ranked-choice", "abstain": [0], "options": [] } },
            "options": { "0": "Abstain", "1": "Yes", "2": "No", "3": 4 },
            "discussionLink": "https://forum.makerdao.com/t/23733"
        }))
        .unwrap()
    }

    fn executive(title: &str) -> MakerRawExecutive {
        MakerRawExecutive {
            title: Some(title.to_string()),
            date: Some("2024-02-01T00:00:00Z".to_string()),
            spell_data: Some(MakerSpellData {
                date_passed: Some("2024-02-02T12:00:00Z".to_string()),
                expiration: Some("2024-03-02T12:00:00Z".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn title_cases_vote_types() {
        assert_eq!(vote_type_label("ranked-choice"), "Ranked Choice");
        assert_eq!(vote_type_label("single-choice"), "Single Choice");
        assert_eq!(vote_type_label("approval"), "Approval");
        assert_eq!(vote_type_label("majority--"), "Majority");
    }

    #[test]
    fn slugifies_executive_titles() {
        assert_eq!(slugify("Hat-check: Add O's to #1"), "hat-check-add-os-to-1");
        assert_eq!(slugify("  Spell   (March 2024)  "), "spell-march-2024");

        let proposal = normalizer()
            .normalize(&RawRecord::MakerExecutive(executive("Hat-check: Add O's to #1")))
            .unwrap();
        assert_eq!(
            proposal.vote_url,
            "https://vote.makerdao.com/executive/template-executive-vote-hat-check-add-os-to-1#proposal-detail"
        );
    }

    #[test]
    fn maps_maker_poll() {
        let proposal = normalizer()
            .normalize(&RawRecord::MakerPoll(maker_poll()))
            .unwrap();

        assert_eq!(proposal.protocol, Protocol::MakerDAO);
        assert_eq!(proposal.kind, ProposalKind::Poll);
        assert_eq!(proposal.vote_type, "Ranked Choice");
        assert_eq!(proposal.options, vec!["Abstain", "Yes", "No", "4"]);
        assert_eq!(proposal.vote_url, "https://vote.makerdao.com/polling/QmWReBMh");
        assert_eq!(proposal.forum_url, "https://forum.makerdao.com/t/23733");
        assert_eq!(
            proposal.date_expiry,
            parse_timestamp("2024-03-07T16:00:00Z")
        );
    }

    #[test]
    fn poll_options_keep_upstream_order() {
        let poll: MakerRawPoll = serde_json::from_value(json!({
            "title": "Order",
            "slug": "order",
            "startDate": "2024-03-04",
            "parameters": { "inputFormat": { "type": "approval" } },
            "options": { "9": "Last", "1": "First", "5": "Middle" }
        }))
        .unwrap();

        let proposal = normalizer().normalize(&RawRecord::MakerPoll(poll)).unwrap();
        assert_eq!(proposal.options, vec!["Last", "First", "Middle"]);
        assert_eq!(proposal.forum_url, "");
        assert!(proposal.date_expiry.is_none());
    }

    #[test]
    fn executive_falls_back_to_date_when_not_passed() {
        let mut raw = executive("Pending spell");
        raw.spell_data = Some(MakerSpellData {
            date_executed: Some("2024-02-10T00:00:00Z".to_string()),
            ..Default::default()
        });

        let proposal = normalizer()
            .normalize(&RawRecord::MakerExecutive(raw))
            .unwrap();
        assert_eq!(proposal.date_added, parse_timestamp("2024-02-01T00:00:00Z").unwrap());
        assert_eq!(proposal.date_executed, parse_timestamp("2024-02-10T00:00:00Z"));
        assert_eq!(proposal.options, vec![String::new()]);
        assert_eq!(proposal.vote_type, "Executive Proposal");
    }

    #[test]
    fn executive_without_any_date_is_rejected() {
        let raw = MakerRawExecutive {
            title: Some("Undated".to_string()),
            ..Default::default()
        };
        let err = normalizer()
            .normalize(&RawRecord::MakerExecutive(raw))
            .unwrap_err();
        assert_eq!(err, MappingError::missing(Protocol::MakerDAO, "date"));
    }

    #[test]
    fn maps_aave_epochs_and_options() {
        let raw = AaveRawProposal {
            ipfs: Some(AaveIpfs {
                title: Some("Add wstETH to Aave V3".to_string()),
                id: Some(42),
            }),
            proposal: Some(AaveOnChain {
                id: Some(7),
                creation_timestamp: Some(1_700_000_000),
                expiration_timestamp: Some(0),
                ..Default::default()
            }),
        };

        let proposal = normalizer().normalize(&RawRecord::Aave(raw)).unwrap();
        assert_eq!(proposal.options, vec!["Yae", "Nay"]);
        assert_eq!(proposal.date_added.timestamp(), 1_700_000_000);
        assert!(proposal.date_expiry.is_none());
        assert_eq!(
            proposal.vote_url,
            "https://app.aave.com/governance/proposal/?proposalId=42"
        );
    }

    #[test]
    fn aave_vote_url_falls_back_to_onchain_id() {
        let raw = AaveRawProposal {
            ipfs: Some(AaveIpfs {
                title: Some("Only onchain id".to_string()),
                ..Default::default()
            }),
            proposal: Some(AaveOnChain {
                id: Some(7),
                creation_timestamp: Some(1_700_000_000),
                expiration_timestamp: Some(1_700_086_400),
                ..Default::default()
            }),
        };

        let proposal = normalizer().normalize(&RawRecord::Aave(raw)).unwrap();
        assert!(proposal.vote_url.ends_with("proposalId=7"));
        assert_eq!(proposal.date_expiry.unwrap().timestamp(), 1_700_086_400);
    }

    #[test]
    fn maps_arbitrum_distinct_support_labels() {
        let stat = |support: &str| TallyVoteStat {
            support: Some(support.to_string()),
            ..Default::default()
        };
        let raw = ArbitrumRawProposal {
            id: Some("2461".to_string()),
            title: Some("AIP-1.2".to_string()),
            vote_stats: Some(vec![stat("FOR"), stat("AGAINST"), stat("FOR"), stat("ABSTAIN")]),
            start: Some(TallyTimestamp {
                timestamp: Some("2024-01-02T00:00:00Z".to_string()),
            }),
            end: Some(TallyTimestamp {
                timestamp: Some("2024-01-16T00:00:00Z".to_string()),
            }),
            created_transaction: Some(TallyTransaction {
                block: Some(TallyTimestamp {
                    timestamp: Some("2024-01-01T00:00:00Z".to_string()),
                }),
            }),
        };

        let proposal = normalizer().normalize(&RawRecord::Arbitrum(raw)).unwrap();
        assert_eq!(proposal.kind, ProposalKind::OnChainProposal);
        assert_eq!(proposal.vote_type, "AIP");
        assert_eq!(proposal.options, vec!["FOR", "AGAINST", "ABSTAIN"]);
        assert_eq!(proposal.date_added, parse_timestamp("2024-01-01T00:00:00Z").unwrap());
        assert_eq!(
            proposal.vote_url,
            "https://www.tally.xyz/gov/arbitrum/proposal/2461"
        );
    }

    #[test]
    fn expiry_before_creation_is_rejected() {
        let mut poll = maker_poll();
        poll.end_date = Some("2024-01-01T00:00:00Z".to_string());

        let err = normalizer()
            .normalize(&RawRecord::MakerPoll(poll))
            .unwrap_err();
        assert_eq!(err.field, "dateExpiry");
    }

    #[test]
    fn missing_field_only_rejects_that_record() {
        let mut broken = maker_poll();
        broken.title = Some("Broken".to_string());
        broken.parameters = Some(MakerPollParameters {
            input_format: Some(MakerInputFormat::default()),
        });

        let mut second = maker_poll();
        second.title = Some("Second".to_string());

        let raws = vec![
            RawRecord::MakerPoll(maker_poll()),
            RawRecord::MakerPoll(broken),
            RawRecord::MakerPoll(second),
        ];
        let batch = normalizer().normalize_batch(&raws);

        let titles: Vec<_> = batch.proposals.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Ratification Poll for Stability Fee Changes", "Second"]
        );
        assert_eq!(batch.rejected.len(), 1);
        assert!(batch.rejected[0].contains("parameters.inputFormat.type"));
    }

    #[test]
    fn undecodable_records_are_rejected_with_their_title() {
        let raws = vec![
            RawRecord::MakerPoll(maker_poll()),
            RawRecord::Undecodable {
                source: SourceKind::MakerExecutive,
                title: Some("Spell".to_string()),
                error: "invalid type: integer `3`, expected a string".to_string(),
            },
        ];
        let batch = normalizer().normalize_batch(&raws);

        assert_eq!(batch.proposals.len(), 1);
        assert_eq!(
            batch.rejected,
            vec![
                "`Spell`: MakerDAO record has missing or invalid `record`: \
                 invalid type: integer `3`, expected a string"
            ]
        );
    }

    #[test]
    fn duplicate_titles_keep_first_occurrence() {
        let mut later = maker_poll();
        later.slug = Some("later".to_string());

        let raws = vec![RawRecord::MakerPoll(maker_poll()), RawRecord::MakerPoll(later)];
        let batch = normalizer().normalize_batch(&raws);

        assert_eq!(batch.proposals.len(), 1);
        assert!(batch.proposals[0].vote_url.ends_with("QmWReBMh"));
        assert_eq!(batch.rejected.len(), 1);
        assert!(batch.rejected[0].starts_with("duplicate title"));
    }

    #[test]
    fn parses_supported_timestamp_formats() {
        let expected = parse_timestamp("2024-03-04T16:00:00Z").unwrap();
        assert_eq!(parse_timestamp("2024-03-04T16:00:00.000Z"), Some(expected));
        assert_eq!(parse_timestamp("Mon, 04 Mar 2024 16:00:00 +0000"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-04 16:00:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-04"),
            parse_timestamp("2024-03-04T00:00:00Z")
        );
        assert!(parse_timestamp("yesterday").is_none());
    }
}
