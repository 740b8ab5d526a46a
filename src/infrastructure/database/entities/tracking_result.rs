// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tracking_results")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub prompt_id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub prompt_text: String,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub job_batch_id: Option<Uuid>,
    pub batch_number: i32,
    pub external_task_id: Option<String>,
    pub status: String,
    pub is_present: Option<bool>,
    pub is_domain_present: Option<bool>,
    pub sentiment: Option<i32>,
    pub salience: Option<i32>,
    pub response: Option<Json>,
    pub citations: Option<Json>,
    pub mention_count: Option<i32>,
    pub domain_mention_count: Option<i32>,
    pub web_search: Option<bool>,
    pub lcp: Option<i32>,
    pub actionability: Option<i32>,
    pub intent_classification: Option<String>,
    pub serp_features: Option<Json>,
    pub ai_search_volume: Option<i64>,
    pub ai_monthly_trends: Option<Json>,
    pub ai_volume_fetched_at: Option<ChronoDateTimeWithTimeZone>,
    pub ai_volume_location_code: Option<i32>,
    pub timestamp_ms: i64,
    pub source: Option<String>,
    pub created_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::job_batch::Entity",
        from = "Column::JobBatchId",
        to = "super::job_batch::Column::Id",
        on_delete = "Cascade"
    )]
    JobBatch,
    #[sea_orm(
        belongs_to = "super::prompt::Entity",
        from = "Column::PromptId",
        to = "super::prompt::Column::Id"
    )]
    Prompt,
}

impl Related<super::job_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobBatch.def()
    }
}

impl Related<super::prompt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prompt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
