use super::AppError;
use crate::config::AppConfig;
use crate::db::models::{ContentItem, ContentSection};
use crate::learn_box::NewItem;
use crate::mind_map::MindMapService;
use crate::AppState;

pub fn list_sections(state: &AppState, query: Option<&str>) -> Vec<ContentSection> {
    match query {
        Some(q) => state.learn_box.search(q),
        None => state.learn_box.sections(),
    }
}

pub fn add_section(state: &AppState, title: &str) -> Result<ContentSection, AppError> {
    Ok(state.learn_box.add_section(title)?)
}

pub fn add_item(
    state: &AppState,
    section_id: &str,
    item: NewItem,
) -> Result<ContentItem, AppError> {
    Ok(state.learn_box.add_item(section_id, item)?)
}

pub fn update_item(
    state: &AppState,
    section_id: &str,
    item_id: &str,
    text: &str,
) -> Result<(), AppError> {
    Ok(state.learn_box.update_text(section_id, item_id, text)?)
}

pub fn delete_item(state: &AppState, section_id: &str, item_id: &str) -> Result<(), AppError> {
    Ok(state.learn_box.delete_item(section_id, item_id)?)
}

pub async fn generate_mind_map(state: &AppState, section_id: &str) -> Result<String, AppError> {
    let config = AppConfig::resolve(&state.db)?;
    let service = MindMapService::new(state.generator(&config));
    Ok(state.learn_box.generate_mind_map(section_id, &service).await?)
}

pub fn clear_mind_map(state: &AppState, section_id: &str) -> Result<(), AppError> {
    Ok(state.learn_box.clear_mind_map(section_id)?)
}
