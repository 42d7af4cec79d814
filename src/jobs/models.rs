use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of job the API can launch. The value is the last path segment of
/// `POST /jobs/{type}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Evaluate,
    Inference,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evaluate => "evaluate",
            Self::Inference => "inference",
        }
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "evaluate" => Ok(Self::Evaluate),
            "inference" => Ok(Self::Inference),
            other => Err(format!("unknown job type '{}'", other)),
        }
    }
}

/// Request body for job creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCreate {
    pub name: String,
    pub description: String,
    pub model: String,
    pub dataset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_samples: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result metadata of a finished job. Fields beyond the ids are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResultResponse {
    pub id: String,
    pub job_id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResultDownloadResponse {
    pub id: String,
    pub download_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_create_omits_unset_options() {
        let request = JobCreate {
            name: "summaries".to_string(),
            description: "bart on thunderbird".to_string(),
            model: "hf://facebook/bart-large-cnn".to_string(),
            dataset: "dset0001".to_string(),
            max_samples: None,
            config_template: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("max_samples"));
        assert!(!object.contains_key("config_template"));
        assert_eq!(object["dataset"], json!("dset0001"));
    }

    #[test]
    fn test_job_result_keeps_extra_fields() {
        let result: JobResultResponse = serde_json::from_value(json!({
            "id": "res-1",
            "job_id": "job-1",
            "metrics": { "rouge1": 0.42 }
        }))
        .unwrap();
        assert_eq!(result.job_id, "job-1");
        assert_eq!(result.extra["metrics"]["rouge1"], json!(0.42));
    }

    #[test]
    fn test_job_type_path_segment() {
        assert_eq!(JobType::Evaluate.as_str(), "evaluate");
        assert_eq!("INFERENCE".parse::<JobType>().unwrap(), JobType::Inference);
        assert!("training".parse::<JobType>().is_err());
    }
}
