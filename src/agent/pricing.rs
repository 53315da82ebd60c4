// src/agent/pricing.rs
// Per-token cost table, grounded on the teacher's
// `llm::provider::openai::pricing::OpenAIPricing` (a per-1M-token rate
// table with a cached-input discount). Concrete provider rate cards are a
// stated Non-goal (§1); this keeps a single plausible default rather than
// per-provider tables.

pub struct AgentPricing;

impl AgentPricing {
    pub const INPUT_PRICE_PER_M: f64 = 1.25;
    pub const CACHED_INPUT_PRICE_PER_M: f64 = 0.125;
    pub const OUTPUT_PRICE_PER_M: f64 = 10.00;
    pub const EMBEDDING_PRICE_PER_M: f64 = 0.02;

    pub fn calculate_cost(uncached_input_tokens: i64, cached_input_tokens: i64, output_tokens: i64) -> f64 {
        let input_cost = (uncached_input_tokens as f64 / 1_000_000.0) * Self::INPUT_PRICE_PER_M;
        let cached_cost = (cached_input_tokens as f64 / 1_000_000.0) * Self::CACHED_INPUT_PRICE_PER_M;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * Self::OUTPUT_PRICE_PER_M;
        input_cost + cached_cost + output_cost
    }

    pub fn calculate_embedding_cost(tokens: i64) -> f64 {
        (tokens as f64 / 1_000_000.0) * Self::EMBEDDING_PRICE_PER_M
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_tokens_cost_less_than_uncached() {
        let uncached = AgentPricing::calculate_cost(1_000_000, 0, 0);
        let cached = AgentPricing::calculate_cost(0, 1_000_000, 0);
        assert!(cached < uncached);
    }

    #[test]
    fn zero_usage_is_free() {
        assert_eq!(AgentPricing::calculate_cost(0, 0, 0), 0.0);
    }
}
