use serde::Deserialize;

use crate::model::Batch;

/// List responses arrive either bare or wrapped in `data`.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum ListBatchesResp {
    Wrapped { data: Vec<Batch> },
    Bare(Vec<Batch>),
}

impl ListBatchesResp {
    pub fn into_batches(self) -> Vec<Batch> {
        match self {
            ListBatchesResp::Wrapped { data } | ListBatchesResp::Bare(data) => data,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum BatchResp {
    Wrapped { data: Batch },
    Bare(Batch),
}

impl BatchResp {
    pub fn into_batch(self) -> Batch {
        match self {
            BatchResp::Wrapped { data } | BatchResp::Bare(data) => data,
        }
    }
}
