use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MakerRawPoll {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub parameters: Option<MakerPollParameters>,
    /// Option id to label; labels are occasionally numeric.
    pub options: Option<Map<String, Value>>,
    pub discussion_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MakerPollParameters {
    pub input_format: Option<MakerInputFormat>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MakerInputFormat {
    #[serde(rename = "type")]
    pub input_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MakerRawExecutive {
    pub title: Option<String>,
    pub date: Option<String>,
    pub spell_data: Option<MakerSpellData>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MakerSpellData {
    pub expiration: Option<String>,
    pub date_passed: Option<String>,
    pub date_executed: Option<String>,
}
