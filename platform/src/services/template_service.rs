use crate::db::models::TemplateCatalogEntry;
use crate::db::seed;
use crate::error::AppError;
use crate::services::agent_service::AgentDraft;
use crate::services::Confirm;
use crate::store::views::{self, TemplateFilter};
use crate::store::EntityStore;

const LOG_TARGET: &str = "agent_platform.templates";

/// Read-mostly workflow template library.
#[derive(Clone)]
pub struct TemplateGalleryService {
    store: EntityStore,
}

impl TemplateGalleryService {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Loads the built-in library. Templates already in the store are kept.
    pub fn load_catalog(&self) -> Result<usize, AppError> {
        if !self.store.templates().is_empty() {
            return Ok(0);
        }
        let templates = seed::sample_templates();
        let count = templates.len();
        self.store.set_templates(templates)?;
        crate::log_info!(LOG_TARGET, "Loaded {} workflow templates", count);
        Ok(count)
    }

    pub fn filtered(&self, filter: &TemplateFilter) -> Vec<TemplateCatalogEntry> {
        self.store
            .read(|snapshot| views::filtered_templates(&snapshot.templates, filter))
    }

    /// Distinct categories in catalog order.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for template in self.store.templates() {
            if !categories.contains(&template.category) {
                categories.push(template.category);
            }
        }
        categories
    }

    /// Prefills an agent builder form from a template.
    pub fn draft_from_template(&self, template_id: &str) -> Result<AgentDraft, AppError> {
        let template = self
            .store
            .template(template_id)
            .ok_or_else(|| AppError::not_found("template", template_id))?;

        let features = template
            .features
            .iter()
            .map(|feature| format!("- {feature}"))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(AgentDraft {
            name: template.name,
            description: template.description,
            system_prompt: format!("You are a workflow agent. Capabilities:\n{features}"),
            ..AgentDraft::default()
        })
    }

    pub fn duplicate_template(&self, template_id: &str) -> Result<TemplateCatalogEntry, AppError> {
        let original = self
            .store
            .template(template_id)
            .ok_or_else(|| AppError::not_found("template", template_id))?;

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let copy = TemplateCatalogEntry {
            id: format!("{}-copy-{}", original.id, &suffix[..8]),
            name: format!("{} (Copy)", original.name),
            downloads: 0,
            ..original
        };
        self.store.add_template(copy.clone())?;
        Ok(copy)
    }

    /// Returns `Ok(false)` when the user declines.
    pub fn delete_template(&self, template_id: &str, confirm: &dyn Confirm) -> Result<bool, AppError> {
        if self.store.template(template_id).is_none() {
            return Err(AppError::not_found("template", template_id));
        }
        if !confirm.confirm("Are you sure you want to delete this template?") {
            return Ok(false);
        }
        Ok(self.store.remove_template(template_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_loads_once_and_filters() {
        let store = EntityStore::new();
        let gallery = TemplateGalleryService::new(store.clone());
        assert_eq!(gallery.load_catalog().unwrap(), 6);
        assert_eq!(gallery.load_catalog().unwrap(), 0);

        let beginner = gallery.filtered(&TemplateFilter {
            difficulty: "beginner".into(),
            ..TemplateFilter::default()
        });
        assert_eq!(beginner.len(), 2);
        assert_eq!(gallery.categories().len(), 6);
    }

    #[test]
    fn duplicate_and_delete_templates() {
        let store = EntityStore::new();
        let gallery = TemplateGalleryService::new(store.clone());
        gallery.load_catalog().unwrap();

        let copy = gallery.duplicate_template("data-pipeline").unwrap();
        assert!(copy.id.starts_with("data-pipeline-copy-"));
        assert_eq!(copy.name, "Data Processing Pipeline (Copy)");
        assert_eq!(store.templates().len(), 7);

        assert!(!gallery.delete_template(&copy.id, &false).unwrap());
        assert!(gallery.delete_template(&copy.id, &true).unwrap());
        assert_eq!(store.templates().len(), 6);
    }

    #[test]
    fn template_prefills_agent_draft() {
        let store = EntityStore::new();
        let gallery = TemplateGalleryService::new(store);
        gallery.load_catalog().unwrap();

        let draft = gallery.draft_from_template("code-assistant").unwrap();
        assert_eq!(draft.name, "AI Code Assistant");
        assert!(draft.system_prompt.contains("Automated testing"));
        assert!(draft.model.is_empty());
        assert!(gallery.draft_from_template("missing").is_err());
    }
}
