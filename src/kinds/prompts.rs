//! Ranking instructions sent to the completion provider.

pub const SIMILAR_SYSTEM_PROMPT: &str = "You are a ranking model for PRODUCT SUBSTITUTABILITY (similar products). Return strict JSON only.";
pub const COMPLEMENTARY_SYSTEM_PROMPT: &str = "You are a ranking model for PRODUCT COMPLEMENTARITY (cross-sell). Return strict JSON only.";
pub const XSELL_SYSTEM_PROMPT: &str =
    "Rank cross-sell products for the given query product. Return strict JSON.";
pub const UPSELL_SYSTEM_PROMPT: &str =
    "Rank upsell products for the given query product. Return strict JSON.";

fn output_format(include_rationale: bool) -> String {
    let rationale = if include_rationale {
        r#","rationale":"brief reason""#
    } else {
        ""
    };
    format!(
        r#"{{"query_id":"<from QUERY.product_id>","results":[{{"id":"<candidate.product_id>","score":0.000{rationale}}}]}}"#
    )
}

fn rules(include_rationale: bool) -> String {
    let mut rules = String::from("RULES:\n- Use ONLY provided CONTEXT\n- Scores: 0.0-1.0 non-increasing\n");
    if include_rationale {
        rules.push_str("- Rationale: ≤25 words, factual\n");
    }
    rules.push_str("- Format: strict JSON\n- Skip low confidence (<0.50)");
    rules
}

fn task(header: &str, include_rationale: bool) -> String {
    format!(
        "{header}\n\n{}\n\nOUTPUT FORMAT: {}",
        rules(include_rationale),
        output_format(include_rationale)
    )
}

pub fn similar_task(include_rationale: bool) -> String {
    task(
        "Rank how well CANDIDATES can replace the QUERY product.\n\n\
         DEFINITION: Similar = same purpose, overlapping attributes, similar price\n\
         NOT similar = complementary (used together) or major category/spec mismatch\n\n\
         SCORING:\n\
         +0.50: Same category & primary purpose\n\
         +0.30: Strong attribute overlap & similar price (±20%)\n\
         +0.20: Same brand/family or comparable positioning\n\
         -0.40: Different primary purpose\n\
         -0.30: Cross-category or major price gap (>50%)",
        include_rationale,
    )
}

pub fn complementary_task(include_rationale: bool) -> String {
    task(
        "Rank how well CANDIDATES complement the QUERY product.\n\n\
         DEFINITION: Complementary = used together (camera↔lens; phone↔case)\n\
         NOT complementary = Similar, same purpose or unrelated items\n\n\
         SCORING:\n\
         +0.50: Strong functional relationship (works with, bundle patterns)\n\
         +0.30: Compatible/matching (size, connector, mount) or shared context\n\
         +0.20: Logical category pair or price-role balance\n\
         -0.50: Same role as QUERY or incompatible\n\
         -0.30: Unrelated purpose/context",
        include_rationale,
    )
}

pub fn xsell_task(include_rationale: bool) -> String {
    task(
        "Rank how well CANDIDATES are cross-sell products for the QUERY product.\n\n\
         DEFINITION: Cross-sell = products often bought together with the query product\n\
         NOT cross-sell = Similar (substitutable) or unrelated items\n\n\
         SCORING:\n\
         +0.50: Very frequently co-purchased (strong signal)\n\
         +0.30: Frequently co-purchased (moderate signal)\n\
         +0.20: Occasionally co-purchased (weak signal)\n\
         -0.50: Rarely/never co-purchased\n\
         -0.30: Similar/substitutable products",
        include_rationale,
    )
}

pub fn upsell_task(include_rationale: bool) -> String {
    task(
        "Rank how well CANDIDATES are premium alternatives to the QUERY product.\n\n\
         DEFINITION: Upsell = same purpose with higher tier, price or capability\n\
         NOT upsell = cheaper, complementary or unrelated items\n\n\
         SCORING:\n\
         +0.50: Same purpose, clearly higher tier\n\
         +0.30: Same category with better specs or materials\n\
         +0.20: Same brand/family at a higher price point\n\
         -0.50: Different purpose\n\
         -0.30: Lower price or tier",
        include_rationale,
    )
}
