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
#[sea_orm(table_name = "job_batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub email: Option<String>,
    pub total_prompts: i32,
    pub total_batches: i32,
    pub completed_batches: i32,
    pub failed_batches: i32,
    pub status: String,
    pub openai_key: String,
    pub openai_model: String,
    pub web_search: bool,
    pub country: Option<String>,
    pub brand_mentions: Json,
    pub domain_mentions: Json,
    pub tags: Json,
    pub error_message: Option<String>,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub updated_at: ChronoDateTimeWithTimeZone,
    pub completed_at: Option<ChronoDateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tracking_result::Entity")]
    TrackingResult,
}

impl Related<super::tracking_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrackingResult.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
