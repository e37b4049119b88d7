use anyhow::{Context, Result, bail};
use std::io::{BufRead, Write};
use tracing::{debug, info, warn};

use crate::model::{ChatOutcome, Message};
use crate::model_gateway::{ModelGateway, ModelGatewayRequest};
use crate::pricing::{Pricing, format_cost};
use crate::tools::{self, ToolDefinition};

const BANNER: &str = "Chat started! Ask the assistant to 'end chat' or 'exit' when you're done.";
const PROMPT: &str = "Enter a message: ";
const FAREWELL_FALLBACK: &str = "Goodbye!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminated,
}

/// Drives one chat session: owns the transcript and asks the gateway for
/// each reply until the model calls `end_chat`.
///
/// The transcript starts with a single system message. User and assistant
/// messages alternate after it, except that a session ended by `end_chat`
/// finishes on the user message that triggered it.
pub struct ConversationLoop<G> {
    gateway: G,
    pricing: Pricing,
    tools: Vec<ToolDefinition>,
    transcript: Vec<Message>,
    state: LoopState,
}

impl<G: ModelGateway> ConversationLoop<G> {
    pub fn new(gateway: G, system_prompt: impl Into<String>, pricing: Pricing) -> Self {
        Self {
            gateway,
            pricing,
            tools: vec![tools::end_chat()],
            transcript: vec![Message::system(system_prompt)],
            state: LoopState::Running,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Sends one user message and prints the resulting interaction block.
    pub async fn run_turn(&mut self, user_input: &str, out: &mut impl Write) -> Result<LoopState> {
        if self.state == LoopState::Terminated {
            bail!("conversation has already ended");
        }

        self.transcript.push(Message::user(user_input));
        debug!(
            turn_messages = self.transcript.len(),
            input_len = user_input.len(),
            "requesting completion"
        );

        let completion = self
            .gateway
            .chat(ModelGatewayRequest {
                messages: self.transcript.clone(),
                tools: self.tools.clone(),
            })
            .await?;
        let cost = self.pricing.cost(&completion.usage);

        match completion.outcome {
            ChatOutcome::Terminate { content, call_id } => {
                let reply = content.as_deref().unwrap_or(FAREWELL_FALLBACK);
                writeln!(out, "You: {user_input}")?;
                writeln!(out, "Assistant: {reply}")?;
                writeln!(out, "Function call ID: {call_id}")?;
                writeln!(out, "Cost: ${}", format_cost(cost))?;

                self.state = LoopState::Terminated;
                info!(
                    call_id = %call_id,
                    transcript_len = self.transcript.len(),
                    "chat ended by model"
                );
            }
            ChatOutcome::Reply { content } => {
                if content.is_empty() {
                    warn!("assistant reply carried no text; keeping empty message");
                }
                writeln!(out, "You: {user_input}")?;
                writeln!(out, "Assistant: {content}")?;
                writeln!(out, "Cost: ${}", format_cost(cost))?;
                writeln!(out)?;

                self.transcript.push(Message::assistant(content));
            }
        }

        Ok(self.state)
    }

    /// Prompts for input until the session terminates. Running out of input
    /// first is an error.
    pub async fn run(&mut self, input: &mut impl BufRead, out: &mut impl Write) -> Result<()> {
        writeln!(out, "{BANNER}\n")?;

        while self.state == LoopState::Running {
            write!(out, "{PROMPT}")?;
            out.flush().context("Failed to flush stdout")?;

            let mut line = String::new();
            let read = input
                .read_line(&mut line)
                .context("Failed to read stdin")?;
            if read == 0 {
                bail!("stdin closed before the chat was ended");
            }

            self.run_turn(strip_line_ending(&line), out).await?;
        }

        Ok(())
    }
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::{self, Cursor};

    use super::{ConversationLoop, LoopState, strip_line_ending};
    use crate::model::{ChatCompletion, ChatOutcome, MessageRole, Usage};
    use crate::model_gateway::{ModelGateway, ModelGatewayFuture, ModelGatewayRequest};
    use crate::pricing::Pricing;

    /// Replays queued completions and records each request it sees.
    struct ScriptedGateway {
        script: RefCell<VecDeque<ChatCompletion>>,
        requests: RefCell<Vec<ModelGatewayRequest>>,
    }

    impl ScriptedGateway {
        fn new(script: Vec<ChatCompletion>) -> Self {
            Self {
                script: RefCell::new(script.into()),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl ModelGateway for &ScriptedGateway {
        fn chat<'a>(&'a self, request: ModelGatewayRequest) -> ModelGatewayFuture<'a> {
            self.requests.borrow_mut().push(request);
            let next = self
                .script
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow!("scripted gateway exhausted"));
            Box::pin(async move { next })
        }
    }

    fn reply(content: &str, prompt_tokens: u64, completion_tokens: u64) -> ChatCompletion {
        ChatCompletion {
            outcome: ChatOutcome::Reply {
                content: content.to_string(),
            },
            usage: Usage {
                prompt_tokens,
                completion_tokens,
            },
        }
    }

    fn terminate(content: Option<&str>, call_id: &str) -> ChatCompletion {
        ChatCompletion {
            outcome: ChatOutcome::Terminate {
                content: content.map(str::to_string),
                call_id: call_id.to_string(),
            },
            usage: Usage {
                prompt_tokens: 40,
                completion_tokens: 10,
            },
        }
    }

    fn new_loop(gateway: &ScriptedGateway) -> ConversationLoop<&ScriptedGateway> {
        ConversationLoop::new(gateway, "You are terse.", Pricing::default())
    }

    fn output_text(out: Vec<u8>) -> String {
        String::from_utf8(out).expect("output should be UTF-8")
    }

    #[tokio::test]
    async fn terminates_after_single_interaction() {
        let gateway = ScriptedGateway::new(vec![terminate(Some("See you!"), "call_1")]);
        let mut conversation = new_loop(&gateway);
        let mut input = Cursor::new("bye\nnever read\n");
        let mut out = Vec::new();

        conversation
            .run(&mut input, &mut out)
            .await
            .expect("session should end cleanly");

        let text = output_text(out);
        assert_eq!(text.matches("You: ").count(), 1, "{text}");
        assert!(text.contains("Assistant: See you!\n"), "{text}");
        assert!(text.contains("Function call ID: call_1\n"), "{text}");
        assert_eq!(conversation.state(), LoopState::Terminated);
        assert_eq!(gateway.requests.borrow().len(), 1);
        assert_eq!(conversation.transcript().len(), 2);
    }

    #[tokio::test]
    async fn transcript_holds_pairs_plus_final_user_message_at_termination() {
        let turns = 3;
        let mut script: Vec<ChatCompletion> = (0..turns)
            .map(|idx| reply(&format!("answer {idx}"), 10, 5))
            .collect();
        script.push(terminate(None, "call_end"));
        let gateway = ScriptedGateway::new(script);
        let mut conversation = new_loop(&gateway);
        let mut input = Cursor::new("one\ntwo\nthree\nquit\n");
        let mut out = Vec::new();

        conversation
            .run(&mut input, &mut out)
            .await
            .expect("session should end cleanly");

        let transcript = conversation.transcript();
        assert_eq!(transcript.len(), 1 + 2 * turns + 1);
        assert_eq!(transcript[0].role, MessageRole::System);
        assert_eq!(transcript[0].content, "You are terse.");
        for (idx, msg) in transcript[1..].iter().enumerate() {
            let expected = if idx % 2 == 0 {
                MessageRole::User
            } else {
                MessageRole::Assistant
            };
            assert_eq!(msg.role, expected, "message {idx}");
        }
        assert_eq!(transcript.last().map(|msg| msg.content.as_str()), Some("quit"));
    }

    #[tokio::test]
    async fn each_request_carries_full_transcript_and_end_chat_tool() {
        let gateway = ScriptedGateway::new(vec![
            reply("first", 1, 1),
            terminate(None, "call_2"),
        ]);
        let mut conversation = new_loop(&gateway);
        let mut input = Cursor::new("a\nb\n");

        conversation
            .run(&mut input, &mut io::sink())
            .await
            .expect("session should end cleanly");

        let requests = gateway.requests.borrow();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[1].messages.len(), 4);
        assert_eq!(requests[1].messages[2].content, "first");
        for request in requests.iter() {
            assert_eq!(request.tools.len(), 1);
            assert_eq!(request.tools[0].function.name, "end_chat");
        }
    }

    #[tokio::test]
    async fn renders_session_output() {
        let gateway = ScriptedGateway::new(vec![
            reply("Hello!", 21, 9),
            terminate(None, "call_9"),
        ]);
        let mut conversation = new_loop(&gateway);
        let mut input = Cursor::new("hi\nbye\n");
        let mut out = Vec::new();

        conversation
            .run(&mut input, &mut out)
            .await
            .expect("session should end cleanly");

        assert_eq!(
            output_text(out),
            "Chat started! Ask the assistant to 'end chat' or 'exit' when you're done.\n\n\
             Enter a message: You: hi\n\
             Assistant: Hello!\n\
             Cost: $0.000009\n\n\
             Enter a message: You: bye\n\
             Assistant: Goodbye!\n\
             Function call ID: call_9\n\
             Cost: $0.000012\n"
        );
    }

    #[tokio::test]
    async fn end_of_input_before_termination_is_an_error() {
        let gateway = ScriptedGateway::new(vec![reply("ok", 1, 1)]);
        let mut conversation = new_loop(&gateway);
        let mut input = Cursor::new("only line\n");

        let err = conversation
            .run(&mut input, &mut io::sink())
            .await
            .expect_err("EOF should fail");

        assert!(format!("{err:#}").contains("stdin closed"));
        assert_eq!(conversation.state(), LoopState::Running);
        assert_eq!(conversation.transcript().len(), 3);
    }

    #[tokio::test]
    async fn gateway_failure_propagates() {
        let gateway = ScriptedGateway::new(Vec::new());
        let mut conversation = new_loop(&gateway);
        let mut input = Cursor::new("hello\n");
        let mut out = Vec::new();

        let err = conversation
            .run(&mut input, &mut out)
            .await
            .expect_err("gateway failure should fail the session");

        assert!(format!("{err:#}").contains("scripted gateway exhausted"));
        assert!(!output_text(out).contains("You: hello"));
        assert_eq!(conversation.state(), LoopState::Running);
    }

    #[tokio::test]
    async fn empty_reply_is_kept_as_empty_assistant_message() {
        let gateway = ScriptedGateway::new(vec![reply("", 3, 0)]);
        let mut conversation = new_loop(&gateway);
        let mut out = Vec::new();

        let state = conversation
            .run_turn("anything?", &mut out)
            .await
            .expect("turn should succeed");

        assert_eq!(state, LoopState::Running);
        assert!(output_text(out).contains("Assistant: \n"));
        let last = conversation.transcript().last().expect("assistant message");
        assert_eq!(last.role, MessageRole::Assistant);
        assert!(last.content.is_empty());
    }

    #[tokio::test]
    async fn turn_after_termination_is_rejected() {
        let gateway = ScriptedGateway::new(vec![terminate(None, "call_x"), reply("late", 1, 1)]);
        let mut conversation = new_loop(&gateway);

        conversation
            .run_turn("exit", &mut io::sink())
            .await
            .expect("terminating turn should succeed");
        let err = conversation
            .run_turn("still there?", &mut io::sink())
            .await
            .expect_err("terminated loop should refuse new turns");

        assert!(format!("{err:#}").contains("already ended"));
        assert_eq!(gateway.requests.borrow().len(), 1);
    }

    #[tokio::test]
    async fn empty_lines_are_sent_verbatim() {
        let gateway = ScriptedGateway::new(vec![terminate(None, "call_e")]);
        let mut conversation = new_loop(&gateway);
        let mut input = Cursor::new("\n");

        conversation
            .run(&mut input, &mut io::sink())
            .await
            .expect("session should end cleanly");

        assert_eq!(gateway.requests.borrow()[0].messages[1].content, "");
    }

    #[test]
    fn strip_line_ending_handles_lf_and_crlf() {
        assert_eq!(strip_line_ending("hi\n"), "hi");
        assert_eq!(strip_line_ending("hi\r\n"), "hi");
        assert_eq!(strip_line_ending("  spaced  \n"), "  spaced  ");
        assert_eq!(strip_line_ending("no newline"), "no newline");
    }
}
