// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Deserialize;
use uuid::Uuid;

/// 回调相关上下文
///
/// postback URL 的查询串是相关信息的载体，在入口解析一次为
/// 类型化记录，之后不再触碰原始查询串
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackContext {
    /// 用户ID
    pub user_id: Uuid,
    /// 使用的OpenAI模型
    #[serde(rename = "openaiModel")]
    pub openai_model: Option<String>,
    /// 是否为夜间任务
    #[serde(rename = "isNightly", default)]
    pub is_nightly: bool,
    /// Prompt ID
    #[serde(rename = "promptId")]
    pub prompt_id: Option<Uuid>,
    /// 项目ID
    #[serde(rename = "projectId")]
    pub project_id: Option<Uuid>,
}

impl CallbackContext {
    /// 组装 postback URL 的查询串
    pub fn to_query(&self) -> String {
        let mut parts = vec![format!("user_id={}", self.user_id)];

        if let Some(model) = &self.openai_model {
            parts.push(format!("openaiModel={}", model));
        }
        parts.push(format!("isNightly={}", self.is_nightly));
        if let Some(prompt_id) = self.prompt_id {
            parts.push(format!("promptId={}", prompt_id));
        }
        if let Some(project_id) = self.project_id {
            parts.push(format!("projectId={}", project_id));
        }

        parts.join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_roundtrip() {
        let context = CallbackContext {
            user_id: Uuid::new_v4(),
            openai_model: Some("gpt-4o-mini".to_string()),
            is_nightly: true,
            prompt_id: Some(Uuid::new_v4()),
            project_id: Some(Uuid::new_v4()),
        };

        let query = context.to_query();
        assert!(query.contains("isNightly=true"));
        assert!(query.contains(&format!("user_id={}", context.user_id)));
        assert!(query.contains(&format!("promptId={}", context.prompt_id.unwrap())));
    }

    #[test]
    fn test_deserializes_from_query_shape() {
        let user_id = Uuid::new_v4();
        let context: CallbackContext = serde_json::from_value(json!({
            "user_id": user_id.to_string(),
            "openaiModel": "gpt-4o-mini",
            "isNightly": false,
        }))
        .unwrap();

        assert_eq!(context.user_id, user_id);
        assert!(!context.is_nightly);
        assert!(context.prompt_id.is_none());
    }
}
