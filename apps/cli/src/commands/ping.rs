//! 心跳检测

use crate::connection::LinkArgs;
use anyhow::Result;
use clap::Args;
use rig_client::Commander;
use std::time::Instant;

#[derive(Args, Debug)]
pub struct PingCommand {
    #[command(flatten)]
    pub link: LinkArgs,

    /// 次数
    #[arg(short, long, default_value_t = 1)]
    pub count: u32,
}

impl PingCommand {
    pub fn execute(&self) -> Result<()> {
        let (link, _) = self.link.open()?;
        let commander = Commander::new(&link);

        let mut lost = 0;
        for seq in 1..=self.count {
            let started = Instant::now();
            match commander.ping() {
                Ok(reply) => println!(
                    "✅ [{}] {} ({:.1} ms)",
                    seq,
                    reply,
                    started.elapsed().as_secs_f64() * 1000.0
                ),
                Err(e) => {
                    lost += 1;
                    println!("❌ [{}] {}", seq, e);
                },
            }
        }

        if lost == self.count {
            anyhow::bail!("设备无响应");
        }
        Ok(())
    }
}
