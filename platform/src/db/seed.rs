//! Built-in catalog data: the "add sample models" set, the offline plugin
//! catalog and the workflow template library.

use crate::db::models::{
    Difficulty, EntityStatus, GenerationParameters, MarketplaceListing, Model, ModelKind,
    PerformanceSnapshot, PluginCatalogEntry, PluginStatus, TemplateCatalogEntry,
};

pub fn sample_models() -> Vec<Model> {
    vec![
        Model {
            id: "minimax-m2-local".into(),
            name: "MiniMax-M2 (Local)".into(),
            kind: ModelKind::Local,
            provider: "vllm".into(),
            model_id: "minimax-m2".into(),
            status: EntityStatus::Active,
            capabilities: tags(&["chat", "completion", "coding", "agentic"]),
            performance: Some(PerformanceSnapshot {
                latency_ms: 142,
                throughput: 847,
                uptime: 99.9,
            }),
            api_base: Some("http://localhost:8000/v1".into()),
            parameters: Some(GenerationParameters::default()),
        },
        Model {
            id: "minimax-m2-api".into(),
            name: "MiniMax-M2 (API)".into(),
            kind: ModelKind::Api,
            provider: "minimax".into(),
            model_id: "minimax-m2".into(),
            status: EntityStatus::Active,
            capabilities: tags(&["chat", "completion", "coding", "agentic"]),
            performance: Some(PerformanceSnapshot {
                latency_ms: 89,
                throughput: 1200,
                uptime: 99.8,
            }),
            api_base: None,
            parameters: Some(GenerationParameters::default()),
        },
        Model {
            id: "gpt-4o".into(),
            name: "GPT-4o".into(),
            kind: ModelKind::Api,
            provider: "openai".into(),
            model_id: "gpt-4o".into(),
            status: EntityStatus::Active,
            capabilities: tags(&["chat", "completion", "vision"]),
            performance: Some(PerformanceSnapshot {
                latency_ms: 234,
                throughput: 456,
                uptime: 99.5,
            }),
            api_base: None,
            parameters: Some(GenerationParameters::default()),
        },
        Model {
            id: "claude-3-sonnet".into(),
            name: "Claude 3 Sonnet".into(),
            kind: ModelKind::Api,
            provider: "anthropic".into(),
            model_id: "claude-3-sonnet-20240229".into(),
            status: EntityStatus::Inactive,
            capabilities: tags(&["chat", "completion", "analysis"]),
            performance: Some(PerformanceSnapshot {
                latency_ms: 312,
                throughput: 378,
                uptime: 99.2,
            }),
            api_base: None,
            parameters: Some(GenerationParameters::default()),
        },
    ]
}

pub fn plugin_categories() -> Vec<String> {
    tags(&[
        "communication",
        "automation",
        "analytics",
        "security",
        "integration",
        "utility",
    ])
}

pub fn sample_plugins() -> Vec<PluginCatalogEntry> {
    vec![
        plugin(
            "webhook-handler",
            "Webhook Handler",
            "Advanced webhook processing with retry logic and error handling",
            "2.1.0",
            "ADK Team",
            "integration",
            &["webhook", "api", "retry", "error-handling"],
            (4.8, 1250, 0.0),
            (true, true),
            &["json-webtoken", "axios"],
        ),
        plugin(
            "slack-integration",
            "Slack Integration",
            "Seamless integration with Slack for notifications and commands",
            "1.5.2",
            "Community",
            "communication",
            &["slack", "notifications", "chat", "commands"],
            (4.6, 890, 0.0),
            (false, false),
            &["@slack/web-api"],
        ),
        plugin(
            "analytics-tracker",
            "Analytics Tracker",
            "Real-time analytics and performance monitoring for agents",
            "3.0.1",
            "ADK Team",
            "analytics",
            &["analytics", "monitoring", "performance", "metrics"],
            (4.9, 2100, 0.0),
            (true, false),
            &["chart.js", "moment"],
        ),
        plugin(
            "security-scanner",
            "Security Scanner",
            "Automated security vulnerability scanning and compliance checking",
            "1.2.0",
            "Security Team",
            "security",
            &["security", "scanning", "compliance", "vulnerability"],
            (4.7, 450, 29.99),
            (false, false),
            &["lodash", "crypto-js"],
        ),
        plugin(
            "auto-scheduler",
            "Auto Scheduler",
            "Intelligent task scheduling with priority management",
            "2.3.1",
            "ADK Team",
            "automation",
            &["scheduling", "tasks", "priority", "automation"],
            (4.5, 1200, 0.0),
            (false, false),
            &["node-cron", "p-limit"],
        ),
    ]
}

pub fn sample_marketplace() -> MarketplaceListing {
    MarketplaceListing {
        plugins: sample_plugins(),
        categories: plugin_categories(),
    }
}

pub fn sample_templates() -> Vec<TemplateCatalogEntry> {
    vec![
        template(
            "customer-support-basic",
            "Customer Support Bot",
            "Automated customer support with ticket routing and escalation",
            "customer-support",
            Difficulty::Beginner,
            (4.8, 1250),
            ("15 minutes", 8, 4),
            &[
                "Intent recognition and classification",
                "Automatic department routing",
                "Response generation",
                "Escalation to human agents",
            ],
            &["chat", "routing", "escalation"],
        ),
        template(
            "data-pipeline",
            "Data Processing Pipeline",
            "Automated data ingestion, transformation, and analysis workflow",
            "data-processing",
            Difficulty::Intermediate,
            (4.6, 890),
            ("30 minutes", 12, 4),
            &[
                "Multi-source data extraction",
                "Data validation and cleaning",
                "Automated transformations",
                "Error handling and logging",
            ],
            &["data", "etl", "analytics"],
        ),
        template(
            "content-generator",
            "Content Generation Assistant",
            "AI-powered content creation with style and tone customization",
            "content-creation",
            Difficulty::Beginner,
            (4.7, 2100),
            ("10 minutes", 6, 3),
            &[
                "Multiple content formats",
                "Style and tone customization",
                "SEO optimization",
                "Quality validation",
            ],
            &["content", "writing", "ai"],
        ),
        template(
            "ecommerce-assistant",
            "E-commerce Product Assistant",
            "Product recommendation engine with inventory management",
            "e-commerce",
            Difficulty::Intermediate,
            (4.5, 756),
            ("25 minutes", 10, 4),
            &[
                "Personalized recommendations",
                "Inventory awareness",
                "Price optimization",
                "Sales analytics",
            ],
            &["recommendations", "inventory", "sales"],
        ),
        template(
            "code-assistant",
            "AI Code Assistant",
            "Intelligent coding helper with testing and documentation",
            "coding",
            Difficulty::Advanced,
            (4.9, 1890),
            ("45 minutes", 15, 5),
            &[
                "Multi-language support",
                "Automated testing",
                "Documentation generation",
                "Code review and optimization",
            ],
            &["coding", "testing", "documentation"],
        ),
        template(
            "email-automation",
            "Email Marketing Automation",
            "Personalized email campaigns with A/B testing",
            "communication",
            Difficulty::Intermediate,
            (4.4, 634),
            ("20 minutes", 9, 4),
            &[
                "Audience segmentation",
                "A/B testing",
                "Personalization",
                "Performance tracking",
            ],
            &["email", "marketing", "automation"],
        ),
    ]
}

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[allow(clippy::too_many_arguments)]
fn plugin(
    id: &str,
    name: &str,
    description: &str,
    version: &str,
    author: &str,
    category: &str,
    plugin_tags: &[&str],
    (rating, downloads, price): (f32, u64, f64),
    (is_installed, is_active): (bool, bool),
    dependencies: &[&str],
) -> PluginCatalogEntry {
    PluginCatalogEntry {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        version: version.into(),
        author: author.into(),
        category: category.into(),
        tags: tags(plugin_tags),
        icon: String::new(),
        rating,
        downloads,
        price,
        is_installed,
        is_active,
        dependencies: tags(dependencies),
        status: if is_installed {
            PluginStatus::Installed
        } else {
            PluginStatus::Available
        },
        verified: true,
        featured: false,
        trending: false,
        new: false,
    }
}

#[allow(clippy::too_many_arguments)]
fn template(
    id: &str,
    name: &str,
    description: &str,
    category: &str,
    difficulty: Difficulty,
    (rating, downloads): (f32, u64),
    (estimated_time, node_count, connections): (&str, u32, u32),
    features: &[&str],
    template_tags: &[&str],
) -> TemplateCatalogEntry {
    TemplateCatalogEntry {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        category: category.into(),
        difficulty,
        rating,
        downloads,
        estimated_time: estimated_time.into(),
        node_count,
        connections,
        features: tags(features),
        tags: tags(template_tags),
        author: "ADK Team".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_ids_are_unique() {
        let mut ids: Vec<_> = sample_models().into_iter().map(|m| m.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);

        let plugins = sample_plugins();
        assert!(plugins.iter().all(|p| p.is_installed || !p.is_active));
        assert_eq!(sample_templates().len(), 6);
    }
}
