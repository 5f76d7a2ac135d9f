//! Player choices.
//!
//! Import runs a two-state machine over the body: `Default`, and
//! `InIfBlock` while inside an `<<if>>` guarding one or more choices. Each
//! `->` line opens a choice; `<<set>>` and `<<jump>>` lines attach to the open
//! choice until the next `->`, `<<if>>` or `<<endif>>`.

use super::{ImportContext, NodeHandler};
use crate::codegen::BlockBuilder;
use crate::condition::{Condition, FlagId};
use crate::error::{CompileError, NodeImportError};
use crate::graph::{Choice, NodeId, NodeKind, PlayerNode};
use crate::script::{self, Command, ScriptBlock};

pub struct PlayerHandler;

/// One body line, already classified
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Choice { text: String, id: Option<String> },
    Jump(NodeId),
    Set(FlagId),
    If(Vec<Condition>),
    EndIf,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChoiceState {
    #[default]
    Default,
    InIfBlock(Vec<Condition>),
}

/// Choices collected so far, and whether the last one still takes body lines
#[derive(Debug)]
pub struct ChoiceList {
    node_id: String,
    pub choices: Vec<Choice>,
    open: bool,
}

impl ChoiceList {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            choices: Vec::new(),
            open: false,
        }
    }

    fn open_choice(&mut self) -> Result<&mut Choice, String> {
        match self.choices.last_mut() {
            Some(choice) if self.open => Ok(choice),
            _ => Err("command does not follow a '->' choice".to_string()),
        }
    }
}

impl ChoiceState {
    /// The single transition function of the choice parser
    pub fn next(self, event: PlayerEvent, list: &mut ChoiceList) -> Result<ChoiceState, String> {
        match (self, event) {
            (state, PlayerEvent::Choice { text, id }) => {
                if text.is_empty() {
                    return Err("choice has no text".to_string());
                }
                let conditions = match &state {
                    ChoiceState::InIfBlock(conditions) => conditions.clone(),
                    ChoiceState::Default => Vec::new(),
                };
                let index = list.choices.len() + 1;
                list.choices.push(Choice {
                    id: id.unwrap_or_else(|| format!("{}-choice-{}", list.node_id, index)),
                    text,
                    next_node_id: None,
                    conditions,
                    set_flags: Vec::new(),
                });
                list.open = true;
                Ok(state)
            }
            (state, PlayerEvent::Jump(target)) => {
                let choice = list.open_choice()?;
                if choice.next_node_id.is_some() {
                    return Err(format!("choice '{}' has more than one jump", choice.id));
                }
                choice.next_node_id = Some(target);
                Ok(state)
            }
            (state, PlayerEvent::Set(flag)) => {
                list.open_choice()?.set_flags.push(flag);
                Ok(state)
            }
            (ChoiceState::Default, PlayerEvent::If(conditions)) => {
                if conditions.is_empty() {
                    return Err("<<if>> guarding a choice has no condition".to_string());
                }
                list.open = false;
                Ok(ChoiceState::InIfBlock(conditions))
            }
            (ChoiceState::InIfBlock(_), PlayerEvent::If(_)) => {
                Err("nested <<if>> inside a player node".to_string())
            }
            (ChoiceState::InIfBlock(_), PlayerEvent::EndIf) => {
                list.open = false;
                Ok(ChoiceState::Default)
            }
            (ChoiceState::Default, PlayerEvent::EndIf) => Err("<<endif>> without <<if>>".to_string()),
        }
    }
}

impl NodeHandler for PlayerHandler {
    type Payload = PlayerNode;

    const KIND: NodeKind = NodeKind::Player;

    fn export_node(&self, node: &PlayerNode, builder: &mut BlockBuilder) -> Result<(), CompileError> {
        builder.add_choices(&node.choices);
        Ok(())
    }

    fn import_node(
        &self,
        block: &ScriptBlock,
        ctx: &mut ImportContext<'_>,
    ) -> Result<PlayerNode, NodeImportError> {
        let mut state = ChoiceState::Default;
        let mut list = ChoiceList::new(ctx.node_id);
        let mut if_line = block.title_line;

        for line in block.meaningful_lines() {
            let text = line.text.as_str();
            if script::is_comment(text) {
                continue;
            }

            let event = if let Some((choice_text, id)) = script::parse_choice(text) {
                PlayerEvent::Choice { text: choice_text, id }
            } else {
                match script::parse_command(text) {
                    Some(Command::Jump(target)) => {
                        PlayerEvent::Jump(ctx.jump_target(target, line.number)?)
                    }
                    Some(Command::Set { flag, value }) => {
                        PlayerEvent::Set(ctx.set_flag(flag, value, line.number)?)
                    }
                    Some(Command::If(condition)) => {
                        if_line = line.number;
                        PlayerEvent::If(ctx.parse_conditions(condition, line.number)?)
                    }
                    Some(Command::EndIf) => PlayerEvent::EndIf,
                    _ => {
                        return Err(ctx.error(
                            line.number,
                            format!("unexpected line '{}' in player node", text),
                        ));
                    }
                }
            };

            state = state
                .next(event, &mut list)
                .map_err(|reason| ctx.error(line.number, reason))?;
        }

        if let ChoiceState::InIfBlock(_) = state {
            return Err(ctx.error(if_line, "<<if>> is never closed with <<endif>>"));
        }
        if list.choices.is_empty() {
            return Err(ctx.error(block.title_line, "player node has no choices"));
        }
        Ok(PlayerNode {
            choices: list.choices,
        })
    }
}
