use fitcheck_contracts::OUTFIT_COUNT;
use serde_json::{json, Value};

pub fn analysis_prompt(excluded: &[String]) -> String {
    let mut prompt = format!(
        "Look at the person in this photo and identify their body shape category \
         (for example hourglass, pear, apple, rectangle or inverted triangle). \
         Explain the classification in one or two sentences. Then suggest exactly \
         {OUTFIT_COUNT} distinct, creative outfits that flatter this body shape. \
         Describe each outfit in a short phrase naming its key pieces."
    );
    if !excluded.is_empty() {
        prompt.push_str(
            "\nDo not suggest any of these outfits, or close variations of them, \
             because they were already shown:",
        );
        for name in excluded {
            prompt.push_str("\n- ");
            prompt.push_str(name);
        }
    }
    prompt.push_str(
        "\nRespond with a JSON object with the fields bodyShape, reason and outfits.",
    );
    prompt
}

/// JSON schema the analysis response is constrained to.
pub fn analysis_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "bodyShape": {
                "type": "STRING",
                "description": "Body shape category of the person in the photo."
            },
            "reason": {
                "type": "STRING",
                "description": "One or two sentences justifying the category."
            },
            "outfits": {
                "type": "ARRAY",
                "description": format!("Exactly {OUTFIT_COUNT} distinct outfit descriptions."),
                "items": { "type": "STRING" }
            }
        },
        "required": ["bodyShape", "reason", "outfits"],
        "propertyOrdering": ["bodyShape", "reason", "outfits"]
    })
}

pub fn primary_generation_prompt(outfit: &str) -> String {
    format!(
        "Generate a photorealistic, full-body image of the exact same person from this \
         photo wearing the following outfit: {outfit}. Keep their body shape, face, \
         hairstyle, skin tone and pose identical. Place them in front of a neutral, \
         light-grey studio backdrop with soft, even lighting. Change only the clothing."
    )
}

pub fn fallback_generation_prompt(outfit: &str) -> String {
    format!(
        "Create a photograph of the person in this image wearing {outfit}. \
         Make it look realistic and authentic."
    )
}
