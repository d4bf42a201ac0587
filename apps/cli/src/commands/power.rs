//! 使能、失能与急停

use crate::connection::LinkArgs;
use anyhow::Result;
use clap::Args;
use rig_client::Commander;
use rig_protocol::ActuatorSelect;

fn select(id: Option<u8>) -> ActuatorSelect {
    id.map_or(ActuatorSelect::All, ActuatorSelect::One)
}

fn describe(select: ActuatorSelect) -> String {
    match select {
        ActuatorSelect::One(id) => format!("舵机 {}", id),
        ActuatorSelect::All => "全部舵机".to_string(),
    }
}

#[derive(Args, Debug)]
pub struct EnableCommand {
    /// 舵机编号（省略表示全部）
    #[arg(short, long)]
    pub id: Option<u8>,

    #[command(flatten)]
    pub link: LinkArgs,
}

impl EnableCommand {
    pub fn execute(&self) -> Result<()> {
        let (link, _) = self.link.open()?;
        let target = select(self.id);
        println!("⚡ 使能{}...", describe(target));
        Commander::new(&link).enable(target)?;
        println!("✅ 使能完成");
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct DisableCommand {
    /// 舵机编号（省略表示全部）
    #[arg(short, long)]
    pub id: Option<u8>,

    #[command(flatten)]
    pub link: LinkArgs,
}

impl DisableCommand {
    pub fn execute(&self) -> Result<()> {
        let (link, _) = self.link.open()?;
        let target = select(self.id);
        println!("💤 失能{}...", describe(target));
        Commander::new(&link).disable(target)?;
        println!("✅ 失能完成");
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct EstopCommand {
    #[command(flatten)]
    pub link: LinkArgs,
}

impl EstopCommand {
    pub fn execute(&self) -> Result<()> {
        let (link, _) = self.link.open()?;
        println!("🛑 发送急停命令（失能全部舵机）...");
        Commander::new(&link).emergency_stop()?;
        println!("✅ 急停已发送");
        Ok(())
    }
}
