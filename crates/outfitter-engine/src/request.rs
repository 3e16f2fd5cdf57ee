use std::collections::BTreeSet;

use outfitter_contracts::api::{
    AdviceOptions, AvatarForApi, FashionAdviceRequest, ItemForApi, VirtualTryOnRequest,
};
use outfitter_contracts::catalog::{Category, StyleCatalog};
use outfitter_contracts::media::DataUri;
use outfitter_contracts::OutfitError;

pub const LOOKS_PER_REQUEST: usize = 3;

const NO_SELECTION_MESSAGE: &str = "Select at least one piece from your closet to generate looks.";
const NO_TRY_ON_SELECTION_MESSAGE: &str = "Select at least one piece to try on.";
const NO_AVATAR_MESSAGE: &str = "Choose a model or send a full-body photo to try pieces on.";

/// Transport-neutral multimodal request: images first, then the instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub images: Vec<DataUri>,
    pub instruction: String,
    pub response_modalities: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdviceRequest {
    items: Vec<ItemForApi>,
    images: Vec<DataUri>,
    style: String,
    custom_prompt: String,
    options: AdviceOptions,
    instruction: String,
}

impl AdviceRequest {
    pub fn new(
        items: Vec<ItemForApi>,
        style: &str,
        custom_prompt: &str,
        options: AdviceOptions,
        styles: &StyleCatalog,
    ) -> Result<Self, OutfitError> {
        if items.is_empty() {
            return Err(OutfitError::validation(NO_SELECTION_MESSAGE));
        }
        let images = item_images(&items)?;
        let categories = present_categories(&items);
        let style_line = match styles.get(style) {
            Some(option) => format!("{} ({})", option.label, option.description),
            None => style.trim().to_string(),
        };
        let instruction = advice_instruction(&categories, &style_line, custom_prompt, options);
        Ok(Self {
            items,
            images,
            style: style.trim().to_string(),
            custom_prompt: custom_prompt.to_string(),
            options,
            instruction,
        })
    }

    pub fn from_api(request: &FashionAdviceRequest, styles: &StyleCatalog) -> Result<Self, OutfitError> {
        Self::new(
            request.items.clone(),
            &request.style,
            &request.custom_prompt,
            request.options,
            styles,
        )
    }

    pub fn to_api(&self) -> FashionAdviceRequest {
        FashionAdviceRequest {
            items: self.items.clone(),
            style: self.style.clone(),
            custom_prompt: self.custom_prompt.clone(),
            options: self.options,
        }
    }

    pub fn items(&self) -> &[ItemForApi] {
        &self.items
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn options(&self) -> AdviceOptions {
        self.options
    }

    pub fn categories(&self) -> BTreeSet<Category> {
        present_categories(&self.items)
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn model_request(&self) -> ModelRequest {
        ModelRequest {
            images: self.images.clone(),
            instruction: self.instruction.clone(),
            response_modalities: vec!["TEXT", "IMAGE"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryOnRequest {
    avatar: DataUri,
    items: Vec<ItemForApi>,
    images: Vec<DataUri>,
    instruction: String,
}

impl TryOnRequest {
    pub fn new(avatar: Option<&DataUri>, items: Vec<ItemForApi>) -> Result<Self, OutfitError> {
        let Some(avatar) = avatar else {
            return Err(OutfitError::validation(NO_AVATAR_MESSAGE));
        };
        if items.is_empty() {
            return Err(OutfitError::validation(NO_TRY_ON_SELECTION_MESSAGE));
        }
        let images = item_images(&items)?;
        let categories = items
            .iter()
            .map(|item| item.category.as_str())
            .collect::<Vec<&str>>()
            .join(", ");
        Ok(Self {
            avatar: avatar.clone(),
            items,
            images,
            instruction: try_on_instruction(&categories),
        })
    }

    pub fn from_api(request: &VirtualTryOnRequest) -> Result<Self, OutfitError> {
        let avatar = request
            .avatar
            .as_ref()
            .map(|avatar| DataUri::from_payload(&avatar.base64, &avatar.mime_type))
            .transpose()?;
        Self::new(avatar.as_ref(), request.items.clone())
    }

    pub fn to_api(&self) -> VirtualTryOnRequest {
        VirtualTryOnRequest {
            avatar: Some(AvatarForApi {
                base64: self.avatar.to_string(),
                mime_type: self.avatar.mime_type().to_string(),
            }),
            items: self.items.clone(),
        }
    }

    pub fn items(&self) -> &[ItemForApi] {
        &self.items
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Avatar first, then every piece in selection order.
    pub fn model_request(&self) -> ModelRequest {
        let mut images = Vec::with_capacity(self.images.len() + 1);
        images.push(self.avatar.clone());
        images.extend(self.images.iter().cloned());
        ModelRequest {
            images,
            instruction: self.instruction.clone(),
            response_modalities: vec!["IMAGE"],
        }
    }
}

fn item_images(items: &[ItemForApi]) -> Result<Vec<DataUri>, OutfitError> {
    items
        .iter()
        .map(|item| DataUri::from_payload(&item.base64, &item.mime_type))
        .collect()
}

fn present_categories(items: &[ItemForApi]) -> BTreeSet<Category> {
    items
        .iter()
        .map(|item| item.category)
        .filter(Category::is_categorized)
        .collect()
}

fn category_line(category: Category) -> &'static str {
    match category {
        Category::Top => "- Top pieces",
        Category::Bottom => "- Bottom pieces",
        Category::FullbodyOuterwear => "- One-piece garments or coats",
        Category::Shoes => "- Shoes",
        Category::Accessory => "- Accessories",
        Category::Uncategorized => "",
    }
}

/// Each detected category and each flag switches exactly one clause; the
/// user's text is embedded verbatim, or `None` when empty.
pub fn advice_instruction(
    categories: &BTreeSet<Category>,
    style_line: &str,
    custom_prompt: &str,
    options: AdviceOptions,
) -> String {
    let mut text = String::from(
        "You are an expert fashion stylist and personal style assistant. Your task is to help \
         the user build great outfits from clothes they already own.\n\n\
         The user provided photos of pieces categorized as:\n",
    );
    for category in Category::WEARABLE {
        if categories.contains(&category) {
            text.push_str(category_line(category));
            text.push('\n');
        }
    }
    if !style_line.is_empty() {
        text.push_str(&format!("\nTarget style: {style_line}\n"));
    }
    text.push_str(&format!(
        "\nCreate {LOOKS_PER_REQUEST} look suggestions, following this order for each one:\n\
         1. Create an image of the look (the pieces arranged on a white background).\n\
         2. Write the look description, explaining which pieces were combined."
    ));
    if options.include_shoes {
        text.push_str("\n- Include shoes in the look whenever possible.");
    }
    if options.include_accessories {
        text.push_str("\n- Add relevant accessories to the look when it makes sense.");
    }
    if options.suggest_new_items {
        text.push_str("\n- Suggest 1 or 2 additional pieces to buy that would complement the look.");
    } else {
        text.push_str(
            "\n- If an essential piece is missing, suggest a generic item to complete the look.",
        );
    }
    let custom = custom_prompt.trim();
    let custom = if custom.is_empty() { "None" } else { custom };
    text.push_str(&format!("\n- Specific user request: \"{custom}\""));
    text.push_str("\n\nStrict output format:");
    for index in 1..=LOOKS_PER_REQUEST {
        text.push_str(&format!("\n[Look {index} image]\n[Look {index} text]"));
    }
    text
}

fn try_on_instruction(categories: &str) -> String {
    format!(
        "You are a virtual fitting room specialist. Your only task is to take the image of a \
         person (avatar) and the images of several clothing pieces and generate ONE new image of \
         that person wearing ONLY the provided pieces.\n\n\
         - Avatar: the first image is the person.\n\
         - Clothing: the following images are the pieces ({categories}).\n\n\
         Instructions:\n\
         1. Analyse the avatar: identify the pose and body of the person in the first image.\n\
         2. Analyse the pieces: identify the garments in the following images.\n\
         3. Create the image: generate a new photorealistic image of the person from the first \
         image wearing the provided pieces, clean and focused on the person and the clothes, on a \
         plain white background.\n\
         4. STRICT: your answer must be ONLY the image. Do not include ANY text, description, \
         markdown or anything else."
    )
}

#[cfg(test)]
mod tests {
    use outfitter_contracts::api::{AdviceOptions, AvatarForApi, ItemForApi, VirtualTryOnRequest};
    use outfitter_contracts::catalog::{Category, StyleCatalog};
    use outfitter_contracts::media::DataUri;

    use super::{AdviceRequest, TryOnRequest};

    fn item(category: Category) -> ItemForApi {
        ItemForApi {
            base64: "data:image/png;base64,AAAA".to_string(),
            mime_type: "image/png".to_string(),
            category,
        }
    }

    fn advice(items: Vec<ItemForApi>, prompt: &str, options: AdviceOptions) -> AdviceRequest {
        AdviceRequest::new(items, "casual", prompt, options, &StyleCatalog::default())
            .unwrap_or_else(|err| panic!("request should build: {err}"))
    }

    #[test]
    fn empty_selection_is_validation_error() {
        let err = AdviceRequest::new(
            Vec::new(),
            "casual",
            "",
            AdviceOptions::default(),
            &StyleCatalog::default(),
        )
        .err();
        assert_eq!(err.map(|err| err.kind()), Some("validation"));
    }

    #[test]
    fn categories_toggle_their_lines() {
        let only_top = advice(vec![item(Category::Top)], "", AdviceOptions::default());
        assert!(only_top.instruction().contains("- Top pieces"));
        assert!(!only_top.instruction().contains("- Shoes"));
        assert!(!only_top.instruction().contains("- Bottom pieces"));

        let mixed = advice(
            vec![item(Category::Shoes), item(Category::Top), item(Category::Bottom)],
            "",
            AdviceOptions::default(),
        );
        let text = mixed.instruction();
        let top = text.find("- Top pieces").unwrap_or(usize::MAX);
        let bottom = text.find("- Bottom pieces").unwrap_or(usize::MAX);
        let shoes = text.find("- Shoes").unwrap_or(usize::MAX);
        assert!(top < bottom && bottom < shoes);
        assert_eq!(
            mixed.categories().into_iter().collect::<Vec<_>>(),
            vec![Category::Top, Category::Bottom, Category::Shoes]
        );
    }

    #[test]
    fn flags_toggle_their_clauses() {
        let plain = advice(vec![item(Category::Top)], "", AdviceOptions::default());
        assert!(!plain.instruction().contains("Include shoes"));
        assert!(!plain.instruction().contains("accessories to the look"));
        assert!(plain.instruction().contains("suggest a generic item"));
        assert!(!plain.instruction().contains("additional pieces to buy"));

        let all = advice(
            vec![item(Category::Top)],
            "",
            AdviceOptions {
                suggest_new_items: true,
                include_shoes: true,
                include_accessories: true,
            },
        );
        assert!(all.instruction().contains("Include shoes"));
        assert!(all.instruction().contains("accessories to the look"));
        assert!(all.instruction().contains("additional pieces to buy"));
        assert!(!all.instruction().contains("suggest a generic item"));
    }

    #[test]
    fn custom_prompt_is_verbatim_or_none() {
        let with_text = advice(
            vec![item(Category::Top)],
            "  \"dinner\" at 8, no heels ",
            AdviceOptions::default(),
        );
        assert!(with_text
            .instruction()
            .contains("Specific user request: \"\"dinner\" at 8, no heels\""));

        let without = advice(vec![item(Category::Top)], "   ", AdviceOptions::default());
        assert!(without.instruction().contains("Specific user request: \"None\""));
    }

    #[test]
    fn style_uses_catalog_description_or_raw_token() {
        let known = advice(vec![item(Category::Top)], "", AdviceOptions::default());
        assert!(known.instruction().contains("Target style: Casual ("));

        let unknown = AdviceRequest::new(
            vec![item(Category::Top)],
            "cyberpunk",
            "",
            AdviceOptions::default(),
            &StyleCatalog::default(),
        )
        .map(|request| request.instruction().to_string())
        .unwrap_or_default();
        assert!(unknown.contains("Target style: cyberpunk"));
    }

    #[test]
    fn instruction_is_deterministic() {
        let a = advice(vec![item(Category::Top)], "x", AdviceOptions::default());
        let b = advice(vec![item(Category::Top)], "x", AdviceOptions::default());
        assert_eq!(a.instruction(), b.instruction());
    }

    #[test]
    fn bare_base64_items_use_their_mime_type() -> anyhow::Result<()> {
        let request = AdviceRequest::new(
            vec![ItemForApi {
                base64: "QUJD".to_string(),
                mime_type: "image/webp".to_string(),
                category: Category::Accessory,
            }],
            "casual",
            "",
            AdviceOptions::default(),
            &StyleCatalog::default(),
        )?;
        let model = request.model_request();
        assert_eq!(model.images[0].to_string(), "data:image/webp;base64,QUJD");
        assert_eq!(model.response_modalities, vec!["TEXT", "IMAGE"]);
        Ok(())
    }

    #[test]
    fn try_on_requires_avatar_and_items() {
        let avatar = DataUri::new("image/png", "AVATAR");
        assert_eq!(
            TryOnRequest::new(None, vec![item(Category::Top)]).err().map(|err| err.kind()),
            Some("validation")
        );
        assert_eq!(
            TryOnRequest::new(Some(&avatar), Vec::new()).err().map(|err| err.kind()),
            Some("validation")
        );
    }

    #[test]
    fn try_on_puts_avatar_first() -> anyhow::Result<()> {
        let avatar = DataUri::new("image/jpeg", "AVATAR");
        let request = TryOnRequest::new(
            Some(&avatar),
            vec![item(Category::Top), item(Category::Shoes)],
        )?;
        let model = request.model_request();
        assert_eq!(model.images.len(), 3);
        assert_eq!(model.images[0], avatar);
        assert_eq!(model.response_modalities, vec!["IMAGE"]);
        assert!(model.instruction.contains("(top, shoes)"));
        assert!(model.instruction.contains("ONLY the image"));
        Ok(())
    }

    #[test]
    fn try_on_from_api_accepts_bare_avatar_payload() -> anyhow::Result<()> {
        let request = TryOnRequest::from_api(&VirtualTryOnRequest {
            avatar: Some(AvatarForApi {
                base64: "QUJD".to_string(),
                mime_type: "image/jpeg".to_string(),
            }),
            items: vec![item(Category::Bottom)],
        })?;
        let api = request.to_api();
        assert_eq!(
            api.avatar.map(|avatar| avatar.base64),
            Some("data:image/jpeg;base64,QUJD".to_string())
        );
        Ok(())
    }
}
