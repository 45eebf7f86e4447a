//! Built-in tasks: exit, pwd, cd, list, help

use std::fs;
use std::io::Write;

use anyhow::Context;
use colored::Colorize;

use super::{ArgumentError, Registry, RegistryError, Task, TaskContext, TaskDescriptor};
use crate::shell::path;

pub fn register_all(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(Box::new(ExitTask))?;
    registry.register(Box::new(PwdTask))?;
    registry.register(Box::new(ChangeDirectoryTask::default()))?;
    registry.register(Box::new(ListDirectoryTask::default()))?;
    registry.register(Box::new(HelpTask::default()))?;
    Ok(())
}

pub struct ExitTask;

impl Task for ExitTask {
    fn describe(&self) -> TaskDescriptor {
        TaskDescriptor::new("Exit", "exit")
            .alias("quit")
            .description("Leave the console")
            .exits()
    }

    fn exec(&mut self, _ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct PwdTask;

impl Task for PwdTask {
    fn describe(&self) -> TaskDescriptor {
        TaskDescriptor::new("Current dir", "pwd").description("Print the current directory")
    }

    fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        writeln!(ctx.out, "> {}", ctx.cwd.display())?;
        Ok(())
    }
}

#[derive(Default)]
pub struct ChangeDirectoryTask {
    target: Option<String>,
}

impl Task for ChangeDirectoryTask {
    fn describe(&self) -> TaskDescriptor {
        TaskDescriptor::new("Change current dir", "cd")
            .description("Change the current directory")
            .argument("DIR", &["Directory to move to.", "Relative to the current directory."])
    }

    fn parse(&mut self, arguments: &[String]) {
        self.target = arguments.first().cloned();
    }

    fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let Some(target) = self.target.as_deref() else {
            return Err(ArgumentError::new("Directory not specified").into());
        };
        let resolved = path::resolve(ctx.cwd.as_path(), target);
        if !resolved.is_dir() {
            return Err(ArgumentError::new("Directory does not exist").into());
        }
        tracing::debug!(from = %ctx.cwd.display(), to = %resolved.display(), "cd");
        *ctx.cwd = resolved;
        Ok(())
    }
}

#[derive(Default)]
pub struct ListDirectoryTask {
    target: Option<String>,
}

impl Task for ListDirectoryTask {
    fn describe(&self) -> TaskDescriptor {
        TaskDescriptor::new("List dir", "list")
            .alias("ls")
            .description("List the entries of a directory")
            .argument("DIR", &["Directory to list, the current one when omitted."])
    }

    fn parse(&mut self, arguments: &[String]) {
        self.target = arguments.first().cloned();
    }

    fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let dir = path::resolve(ctx.cwd.as_path(), self.target.as_deref().unwrap_or(""));
        if !dir.is_dir() {
            return Err(ArgumentError::new("Directory does not exist").into());
        }

        let entries = fs::read_dir(&dir)
            .with_context(|| format!("cannot read '{}'", dir.display()))?;
        let mut items: Vec<(String, bool)> = entries
            .filter_map(|e| e.ok())
            .map(|e| {
                let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
                (e.file_name().to_string_lossy().to_string(), is_dir)
            })
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));

        let names: Vec<String> = items
            .into_iter()
            .map(|(name, is_dir)| {
                if is_dir {
                    name.blue().bold().to_string()
                } else {
                    name
                }
            })
            .collect();
        writeln!(ctx.out, "> {}", names.join("  "))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct HelpTask {
    topic: Option<String>,
}

impl HelpTask {
    fn list_commands(ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let mut commands: Vec<&TaskDescriptor> = ctx.catalog.iter().collect();
        commands.sort_by(|a, b| a.command.cmp(&b.command));

        writeln!(ctx.out, "> Commands list :")?;
        for descriptor in commands {
            writeln!(ctx.out, "\t{}", descriptor.command.green())?;
        }
        writeln!(ctx.out)?;
        writeln!(ctx.out, "'{}' for further details", "help <command>".yellow())?;
        Ok(())
    }

    fn describe_command(
        ctx: &mut TaskContext<'_>,
        descriptor: &TaskDescriptor,
    ) -> anyhow::Result<()> {
        writeln!(ctx.out, "> {}", descriptor.command.green().bold())?;
        if !descriptor.aliases.is_empty() {
            writeln!(ctx.out, "  aliases: {}", descriptor.aliases.join(", "))?;
        }
        for line in &descriptor.description {
            writeln!(ctx.out, "  {}", line)?;
        }
        if !descriptor.arguments.is_empty() {
            writeln!(ctx.out)?;
            writeln!(ctx.out, "  Arguments:")?;
            for argument in &descriptor.arguments {
                writeln!(ctx.out, "    {}", argument.name.cyan())?;
                for line in &argument.lines {
                    writeln!(ctx.out, "      {}", line)?;
                }
            }
        }
        Ok(())
    }
}

impl Task for HelpTask {
    fn describe(&self) -> TaskDescriptor {
        TaskDescriptor::new("Help", "help")
            .description("List the available commands or describe one of them")
            .argument("COMMAND", &["Command or alias to describe."])
    }

    fn parse(&mut self, arguments: &[String]) {
        self.topic = arguments.first().cloned();
    }

    fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let found = self.topic.as_deref().and_then(|t| ctx.lookup(t)).cloned();
        match found {
            Some(descriptor) => Self::describe_command(ctx, &descriptor),
            None => Self::list_commands(ctx),
        }
    }
}
