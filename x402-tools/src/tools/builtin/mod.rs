mod paid_agents;

pub use paid_agents::PaidAgentTool;
