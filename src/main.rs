use forge::prelude::*;
use taskling::functions;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ForgeConfig::from_file("forge.toml")?;
    let mut builder = Forge::builder();

    let fns = builder.function_registry_mut();
    fns.register_query::<functions::ListSchedulesQuery>();
    fns.register_mutation::<functions::CreateScheduleMutation>();
    fns.register_mutation::<functions::PauseScheduleMutation>();
    fns.register_mutation::<functions::ResumeScheduleMutation>();
    fns.register_mutation::<functions::UpdateScheduleCronMutation>();
    fns.register_mutation::<functions::DeleteScheduleMutation>();
    fns.register_mutation::<functions::ApplyScheduleIntentMutation>();

    let daemons = builder.daemon_registry_mut();
    daemons.register::<functions::ClockDaemon>();

    builder.config(config).build()?.run().await
}
