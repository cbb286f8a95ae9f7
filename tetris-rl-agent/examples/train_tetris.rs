//! Example: DQN agent learning Tetris

use tetris_rl_agent::{DQNAgent, DQNConfig};
use tetris_rl_core::{
    Agent, AgentConfig, EnvironmentConfig, Environment, EpochMetrics, TrackedEnvironment,
    Transition,
};
use tetris_rl_env::{TetrisEnv, TimeLimit};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Create the Tetris environment with a step budget per episode
    let env = TetrisEnv::new(EnvironmentConfig {
        seed: Some(0),
        ..Default::default()
    })?;
    let env = TimeLimit::new(env, 2_000);
    let mut env = TrackedEnvironment::new(env);

    // Create the learning agent
    let mut agent = DQNAgent::new(DQNConfig {
        base: AgentConfig {
            learning_rate: 1e-3,
            gamma: 0.95,
            batch_size: 32,
            buffer_size: 20_000,
        },
        epsilon_start: 1.0,
        epsilon_decay: 0.02,
        seed: Some(0),
        ..Default::default()
    });

    // Run epochs: one epoch is one full game
    let num_epochs = 50;

    for epoch in 0..num_epochs {
        let (mut observation, _info) = env.reset().await?;
        let mut total_reward = 0.0;
        let mut last_info = None;

        loop {
            // Select action
            let (action, _values) = agent.select_action(&observation).await?;

            // Take step
            let step = env.step(action).await?;
            total_reward += step.reward.0;

            // Record the transition; this also runs one training step
            let transition = Transition::new(
                observation,
                action,
                step.reward,
                step.observation.clone(),
                step.done,
            );
            agent.observe(transition).await?;

            let terminal = step.is_terminal();
            last_info = Some(step.info);
            observation = step.observation;

            if terminal {
                break;
            }
        }

        // Finalize the epoch with the metrics the game reports
        let info = last_info.unwrap_or_default();
        let metrics = EpochMetrics {
            lines: info.get_u64("lines").unwrap_or(0),
            score: info.get_u64("score").unwrap_or(0),
        };
        agent.finish_epoch(metrics).await?;

        println!(
            "Epoch {}: Score = {}, Lines = {}, Reward = {:.1}, Epsilon = {:.2}",
            epoch + 1,
            metrics.score,
            metrics.lines,
            total_reward,
            agent.epsilon()
        );
    }

    // Persist what was learned
    let weights_path = std::path::Path::new("tetris_dqn_weights.json");
    agent.save_weights(weights_path).await?;
    println!("Saved weights to {}", weights_path.display());

    env.close().await?;

    Ok(())
}
