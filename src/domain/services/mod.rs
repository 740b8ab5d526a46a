// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 品牌匹配服务
pub mod brand_matcher;

/// 富化引擎
pub mod enrichment_service;

/// 意图分类器
pub mod intent_classifier;

/// LLM服务
pub mod llm_service;

/// 邮件通知接口
pub mod notifier;
