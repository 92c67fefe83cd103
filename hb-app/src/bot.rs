//! Chat front-end: reads inbound chat messages and answers each one on its
//! own task.

use crate::agents::{AgentError, RelayClient, TaskGatewayClient};
use crate::commands::{self, BotCommand};
use crate::config::{BotConfig, HortabotConfig};
use crate::routine;
use crate::server::shutdown_signal;
use anyhow::Result;
use hb_channels::{ChannelAdapter, InboundMessage, OutboundMessage, TelegramAdapter};
use hb_tasks::{NewTask, TaskItem, TaskList};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const INBOUND_QUEUE_CAPACITY: usize = 256;

const HELP_TEXT: &str = "Available commands:\n\
/start - Start the conversation\n\
/help - Show this help message\n\
/info - About this bot\n\
/add_task <name> - Add a task to your task list\n\
/list_tasks - Show your task lists\n\
/list_tasks <list id> - Show the tasks in one list\n\
/create_routine - Generate a care routine and save it as tasks\n\n\
You can also ask me about watering, light, or how to care for a plant!";

const INFO_TEXT: &str = "*Virtual Horticultural Therapy Advisor*\n\n\
I am an assistant specialized in horticultural therapy, powered by AI.\n\n\
How to use me:\n\
• Ask questions about plants and their care\n\
• Keep your gardening tasks in Google Tasks with /add_task and /create_routine\n\
• Use /help to see all commands\n\n\
Built to support your well-being through plants!";

const PROMPT_ACK: &str =
    "Your request was sent to the advisor. Please wait for the AI's answer...";
const PROMPT_FAILED: &str = "Sorry, I couldn't get instructions right now. Please try again later or check that the instructions agent is running.";
const EMPTY_HINT: &str = "I got your message! Send me a question about horticultural therapy so I can help. Use /help to see the available commands.";
const ADD_TASK_USAGE: &str = "Tell me what to add, e.g. /add_task Water the basil";
const ROUTINE_ACK: &str = "Asking the advisor for a routine. This can take a moment...";
const INSTRUCTION_PREFIX: &str = "Advisor's instruction:";

pub struct Bot {
    cfg: BotConfig,
    channel: Arc<dyn ChannelAdapter>,
    relay: RelayClient,
    tasks: TaskGatewayClient,
}

impl Bot {
    pub fn new(
        cfg: BotConfig,
        channel: Arc<dyn ChannelAdapter>,
        relay: RelayClient,
        tasks: TaskGatewayClient,
    ) -> Self {
        Self {
            cfg,
            channel,
            relay,
            tasks,
        }
    }

    pub fn start(
        self: Arc<Self>,
        inbound_rx: mpsc::Receiver<InboundMessage>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move { self.run_loop(inbound_rx, shutdown).await })
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn run_loop(
        self: Arc<Self>,
        mut inbound_rx: mpsc::Receiver<InboundMessage>,
        shutdown: CancellationToken,
    ) {
        loop {
            let inbound = tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = inbound_rx.recv() => match msg {
                    Some(inbound) => inbound,
                    None => break,
                },
            };

            let bot = self.clone();
            tokio::spawn(async move {
                let chat_id = inbound.chat_id.clone();
                if let Err(e) = bot.handle_inbound(inbound).await {
                    tracing::warn!(%chat_id, error = %e, "handle_inbound failed");
                }
            });
        }
        tracing::info!("bot loop stopped");
    }

    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(chat_id = %inbound.chat_id, message_id = %inbound.message_id)
    )]
    pub async fn handle_inbound(&self, inbound: InboundMessage) -> Result<()> {
        let command = commands::parse(&inbound.content);
        tracing::info!(
            sender_id = %inbound.sender_id,
            command = command.name(),
            "inbound message"
        );

        match command {
            BotCommand::Start => {
                let name = inbound.sender_name.as_deref().unwrap_or("friend");
                self.reply(
                    &inbound,
                    OutboundMessage::text(format!(
                        "Welcome, {name}! I am your virtual horticultural therapy advisor. Send me your questions or use /help."
                    )),
                )
                .await
            }
            BotCommand::Help => self.reply(&inbound, OutboundMessage::text(HELP_TEXT)).await,
            BotCommand::Info => {
                self.reply(&inbound, OutboundMessage::markdown(INFO_TEXT))
                    .await
            }
            BotCommand::AddTask(None) => {
                self.reply(&inbound, OutboundMessage::text(ADD_TASK_USAGE))
                    .await
            }
            BotCommand::AddTask(Some(title)) => {
                self.typing(&inbound).await;
                let text = match self.add_task(&title).await {
                    Ok(text) => text,
                    Err(e) => self.describe_failure(&e),
                };
                self.reply(&inbound, OutboundMessage::text(text)).await
            }
            BotCommand::ListTasks(list_id) => {
                self.typing(&inbound).await;
                let result = match list_id {
                    None => self.tasks.list_task_lists().await.map(|l| render_lists(&l)),
                    Some(id) => self
                        .tasks
                        .list_tasks(&id)
                        .await
                        .map(|t| render_tasks(&id, &t)),
                };
                let text = result.unwrap_or_else(|e| self.describe_failure(&e));
                self.reply(&inbound, OutboundMessage::text(text)).await
            }
            BotCommand::CreateRoutine => {
                self.reply(&inbound, OutboundMessage::text(ROUTINE_ACK))
                    .await?;
                self.typing(&inbound).await;
                let text = match routine::create_routine(
                    &self.relay,
                    &self.tasks,
                    &self.cfg.routine_list_name,
                )
                .await
                {
                    Ok(outcome) => outcome.render(),
                    Err(e) => self.describe_failure(&e),
                };
                self.reply(&inbound, OutboundMessage::text(text)).await
            }
            BotCommand::Prompt(text) => {
                self.reply(&inbound, OutboundMessage::text(PROMPT_ACK))
                    .await?;
                self.typing(&inbound).await;
                let answer = match self.relay.ask(&text).await {
                    Ok(answer) => format!("{INSTRUCTION_PREFIX} {answer}"),
                    Err(e) => {
                        tracing::warn!(error = %e, "instruction relay failed");
                        PROMPT_FAILED.to_string()
                    }
                };
                self.reply(&inbound, OutboundMessage::text(answer)).await
            }
            BotCommand::Unknown(keyword) => {
                self.reply(
                    &inbound,
                    OutboundMessage::text(format!(
                        "Unknown command /{keyword}. Use /help to see the available commands."
                    )),
                )
                .await
            }
            BotCommand::Empty => self.reply(&inbound, OutboundMessage::text(EMPTY_HINT)).await,
        }
    }

    /// Resolve the default list by name, then insert into it.
    async fn add_task(&self, title: &str) -> std::result::Result<String, AgentError> {
        let list = self
            .tasks
            .find_or_create_list(&self.cfg.default_list_name)
            .await?;
        let task = self
            .tasks
            .insert_task(&list.id, &NewTask::titled(title))
            .await?;
        Ok(format!(
            "Task \"{}\" added to \"{}\"{}.",
            task.title,
            list.title,
            if list.created { " (new list)" } else { "" }
        ))
    }

    fn describe_failure(&self, err: &AgentError) -> String {
        tracing::warn!(error = %err, "agent request failed");
        match err {
            AgentError::AuthRequired { authorize_url } => format!(
                "I need access to your Google Tasks first. Open {authorize_url} to authorize, then try again."
            ),
            AgentError::Unreachable { service, .. } => format!(
                "Sorry, I couldn't reach the {service} right now. Please check that it is running and try again later."
            ),
            AgentError::InvalidArgument(message) => {
                format!("That request was not valid: {message}")
            }
            AgentError::NotFound(_) => {
                "I couldn't find that task list. Use /list_tasks to see your lists.".to_string()
            }
            AgentError::Upstream {
                service,
                status: 502,
                ..
            } => format!(
                "The {service} could not reach its backend (status 502). Please check that the service is running and try again later."
            ),
            AgentError::Upstream { service, status, .. } => format!(
                "The {service} reported an error (status {status}). Please try again later."
            ),
            AgentError::ResponseFormat { .. } | AgentError::Config(_) => {
                "Sorry, something went wrong while handling your request.".to_string()
            }
        }
    }

    async fn reply(&self, inbound: &InboundMessage, message: OutboundMessage) -> Result<()> {
        self.channel
            .send(
                inbound.reply_target(),
                message.in_reply_to(inbound.message_id.clone()),
            )
            .await
    }

    async fn typing(&self, inbound: &InboundMessage) {
        if !self.channel.supports_typing_events() {
            return;
        }
        if let Err(e) = self.channel.send_typing(inbound.reply_target()).await {
            tracing::debug!(error = %e, "typing indicator failed");
        }
    }
}

fn render_lists(lists: &[TaskList]) -> String {
    if lists.is_empty() {
        return "You have no task lists yet. Add a task with /add_task <name> to create one."
            .to_string();
    }
    let mut out = String::from("Your task lists:\n");
    for list in lists {
        out.push_str(&format!("• {} (id: {})\n", list.title, list.id));
    }
    out.push_str("\nUse /list_tasks <id> to see the tasks in a list.");
    out
}

fn render_tasks(list_id: &str, tasks: &[TaskItem]) -> String {
    if tasks.is_empty() {
        return format!("The list {list_id} has no tasks.");
    }
    let mut out = format!("Tasks in {list_id}:\n");
    for task in tasks {
        let marker = if task.is_completed() { "[x]" } else { "[ ]" };
        out.push_str(&format!("{marker} {}", task.title));
        if let Some(due) = task.due {
            out.push_str(&format!(" (due {})", due.format("%Y-%m-%d")));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Run the bot process until SIGINT/SIGTERM.
pub async fn run(cfg: &HortabotConfig) -> Result<()> {
    cfg.require_bot_token()?;
    tracing::info!(
        instructions_agent_url = %cfg.bot.instructions_agent_url,
        tasks_agent_url = %cfg.bot.tasks_agent_url,
        default_list_name = %cfg.bot.default_list_name,
        routine_list_name = %cfg.bot.routine_list_name,
        "bot configuration loaded"
    );

    let channel: Arc<dyn ChannelAdapter> = Arc::new(TelegramAdapter::new(&cfg.bot.bot_token)?);
    let bot = Arc::new(Bot::new(
        cfg.bot.clone(),
        channel.clone(),
        RelayClient::new(&cfg.bot.instructions_agent_url)?,
        TaskGatewayClient::new(&cfg.bot.tasks_agent_url)?,
    ));

    let shutdown = CancellationToken::new();
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
    channel.start(inbound_tx, shutdown.child_token()).await?;
    let handle = bot.start(inbound_rx, shutdown.child_token());
    tracing::info!(channel = channel.channel_id(), "telegram bot running");

    shutdown_signal(shutdown.clone()).await;
    match handle.await {
        Ok(()) => tracing::info!("bot shutdown completed"),
        Err(e) => tracing::error!(error = %e, "bot task join failed during shutdown"),
    }
    Ok(())
}
