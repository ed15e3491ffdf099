use acmp_autosolve::utils::logging;
use acmp_autosolve::{App, Config};
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env()?;
    config.validate()?;

    // 初始化并运行应用，致命错误以非零状态退出
    App::initialize(config)?.run().await?;

    Ok(())
}
