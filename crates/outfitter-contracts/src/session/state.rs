use super::looks::LookBatch;
use super::selection::SelectionSet;
use crate::api::AdviceOptions;
use crate::catalog::{AvatarCatalog, StyleCatalog};
use crate::media::DataUri;

/// Everything one user session holds between requests. Nothing here is
/// persisted.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub session_id: String,
    pub generator_selection: SelectionSet,
    pub try_on_selection: SelectionSet,
    pub style: String,
    pub custom_prompt: String,
    pub options: AdviceOptions,
    pub avatar_id: String,
    pub looks: LookBatch,
    pub try_on_result: Option<DataUri>,
}

impl Session {
    pub fn new(styles: &StyleCatalog, avatars: &AvatarCatalog) -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4().simple()),
            style: styles
                .default_style()
                .map(|style| style.value.clone())
                .unwrap_or_default(),
            avatar_id: avatars
                .default_avatar()
                .map(|avatar| avatar.id.clone())
                .unwrap_or_default(),
            ..Self::default()
        }
    }
}
