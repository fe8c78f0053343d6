//! Prompt text for every generation call.

use common::ResearchRequest;

pub fn research_system_prompt(schema_json: &str) -> String {
    format!(
        r#"You are a prediction market analyst writing for a general audience. Use simple, clear language, no jargon, no filler. Write like you're explaining to a smart 8th grader.

RULES:
- Give 4-8 findings grouped into 2-4 categories.
- Each finding is ONE sentence with a **specific** number, date, or name. No vague statements.
- Wrap the single most important phrase in each bullet with **bold** markdown. Max one bold per bullet.
- BAD: "Aggressive rate hikes could quickly accelerate unemployment."
- GOOD: "The Fed raised rates **11 times since 2022**, the fastest pace since the 1980s; historically, that leads to a recession within 18 months."
- Lead with what actually matters. Skip obvious stuff.
- If someone claims they want to do something, question whether they actually can.
- Be honest when the evidence is weak.

QUESTION TYPE HANDLING:
1. "Who/what will" questions (e.g. "who will be the next pope?"):
   - Include a "candidates" array with the top 5-8 most likely outcomes, each with "name" and "probability" (decimal 0-1).
   - Probabilities MUST add up to exactly 1.0.
   - Every candidate MUST be a specific, named person or entity. NEVER include vague options like "No clear successor", "Status quo", "None", "No one", "Other", or "Unknown".
   - If the market data includes candidate names and prices, use those candidates as your starting point and include ALL of them.
2. "How high/how much/how many" questions (e.g. "how high will unemployment get?"):
   - Include a "thresholds" array with 3-5 key levels, each with "level" (like "Above 5%") and "probability" (decimal 0-1).
3. Simple yes/no questions: omit both arrays.

For probability:
- estimate: a decimal (0.0 to 1.0) for the YES outcome. For candidate questions, the top candidate's probability.
- reasoning: 1 sentence, MAX 2. For candidate questions, explain WHY the top candidate is most likely. Never describe the question type.
- confidence: how much real data backs this up ("high", "medium" or "low").

Also include:
- "imagePrompt": a short, specific, visual description of a relevant photo for this bet.
- "validityHours": how many hours this research stays accurate. Use 1-4 for fast-moving topics (live games, breaking news, daily prices), up to 168 for slow-moving ones.

Respond with ONLY a JSON object conforming to this schema:
{}
"#,
        schema_json
    )
}

pub fn research_user_prompt(request: &ResearchRequest) -> String {
    let category = non_empty_or(&request.category, "Unknown");
    let details = non_empty_or(&request.details, "No additional details");

    let mut prompt = format!(
        "Analyze this prediction market bet:\n\nTitle: {}\nCategory: {}\nDetails: {}\n",
        request.title, category, details
    );
    if let Some(price) = request.market_price {
        prompt.push_str(&format!("Current market price (YES): {}%\n", percent(price)));
    }
    if !request.market_candidates.is_empty() {
        prompt.push_str("\nKALSHI MARKET CANDIDATES AND CURRENT PRICES:\n");
        for candidate in &request.market_candidates {
            prompt.push_str(&format!("- {}: {}%\n", candidate.name, percent(candidate.price)));
        }
        prompt.push_str(
            "\nUse these candidates as your starting point. Include ALL of them. You may adjust probabilities based on your research.\n",
        );
    }
    prompt.push_str(
        "\nGive me the key factors (one short bullet each with specific data) and your honest probability estimate. Write simply. Respond ONLY with valid JSON.",
    );
    prompt
}

pub fn steps_prompt(request: &ResearchRequest) -> String {
    format!(
        r#"Given this prediction market bet: "{}" (category: {}), generate 5-7 hyper-specific research steps that an analyst would check. Each step should be a short phrase (5-10 words) specific to THIS bet. Not generic.

Examples for a tennis bet "Sinner vs Alcaraz Australian Open":
- "Sinner vs Alcaraz head-to-head record"
- "Sinner's hard court win rate 2025"
- "Alcaraz recent injury reports"
- "Australian Open upset history"
- "Current ATP rankings comparison"

Return ONLY a JSON array of strings. No other text."#,
        request.title,
        non_empty_or(&request.category, "General")
    )
}

pub fn extend_prompt(request: &ResearchRequest, existing_titles: &[String]) -> String {
    let covered = if existing_titles.is_empty() {
        "unknown".to_string()
    } else {
        existing_titles.join(", ")
    };
    format!(
        r#"You previously researched this prediction market bet: "{}" ({}).
Details: {}

You already covered these categories: {}.

Now provide 2-3 NEW research categories with findings that would MOST impact the odds. Focus on angles not yet covered. Same format rules:
- Each finding is ONE sentence with a **specific** number, date, or name bolded.
- Be hyper-specific and data-driven.

Return ONLY valid JSON:
{{
  "categories": [
    {{
      "title": "Short Label",
      "icon": "one of: history, trending, stats, health, clock, map, trophy, cloud, brain, users, news, alert",
      "confidence": "high" | "medium" | "low",
      "bullets": ["One sentence with **key phrase bolded**."]
    }}
  ]
}}"#,
        request.title,
        non_empty_or(&request.category, "General"),
        non_empty_or(&request.details, "None"),
        covered
    )
}

pub fn chat_system_prompt(request: &ResearchRequest, research_context: &str) -> String {
    format!(
        r#"You are a knowledgeable prediction market analyst assistant. The user is viewing research about: "{}".

Here is the research data they're looking at:
{}

Answer their question using your full knowledge; you are NOT limited to the research above. Use the research data when relevant, but also draw on general knowledge, history, statistics, and context to give the best answer. Be concise (2-4 sentences), direct, and use simple language. If you cite a number or fact, be specific."#,
        request.title, research_context
    )
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn percent(probability: f64) -> i64 {
    (probability * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MarketCandidate;

    #[test]
    fn test_user_prompt_lists_price_and_candidates() {
        let request = ResearchRequest::new("K", "Next pope?", "")
            .with_market_price(0.314)
            .with_candidates(vec![MarketCandidate { name: "Parolin".into(), price: 0.28 }]);
        let prompt = research_user_prompt(&request);
        assert!(prompt.contains("Category: Unknown"));
        assert!(prompt.contains("Details: No additional details"));
        assert!(prompt.contains("Current market price (YES): 31%"));
        assert!(prompt.contains("- Parolin: 28%"));
    }

    #[test]
    fn test_user_prompt_omits_unknown_price() {
        let prompt = research_user_prompt(&ResearchRequest::new("K", "Will it rain?", "Climate"));
        assert!(!prompt.contains("Current market price"));
        assert!(!prompt.contains("CANDIDATES"));
    }

    #[test]
    fn test_extend_prompt_lists_covered_titles() {
        let request = ResearchRequest::new("K", "Will it rain?", "Climate");
        let prompt = extend_prompt(&request, &["History".into(), "Models".into()]);
        assert!(prompt.contains("You already covered these categories: History, Models."));
        assert!(prompt.contains("Details: None"));
    }
}
