//! Character (NPC) lines: `Speaker: content`, then `<<set>>` lines, then an
//! optional `<<jump>>`.

use super::{ImportContext, NodeHandler};
use crate::codegen::BlockBuilder;
use crate::error::{CompileError, NodeImportError};
use crate::graph::{CharacterNode, NodeKind};
use crate::script::{self, Command, ScriptBlock};

pub struct CharacterHandler;

impl NodeHandler for CharacterHandler {
    type Payload = CharacterNode;

    const KIND: NodeKind = NodeKind::Character;

    fn export_node(
        &self,
        node: &CharacterNode,
        builder: &mut BlockBuilder,
    ) -> Result<(), CompileError> {
        if !script::is_speaker(&node.speaker) {
            return Err(CompileError::invalid_identifier("speaker", &node.speaker));
        }
        builder
            .dialogue(Some(&node.speaker), &node.content)
            .set_flags(&node.set_flags)
            .jump(node.next_node_id.as_deref());
        Ok(())
    }

    fn import_node(
        &self,
        block: &ScriptBlock,
        ctx: &mut ImportContext<'_>,
    ) -> Result<CharacterNode, NodeImportError> {
        let mut speaker: Option<&str> = None;
        let mut lines = Vec::new();
        let mut next_node_id = None;
        let mut set_flags = Vec::new();

        for line in block.meaningful_lines() {
            let text = line.text.as_str();
            if script::is_comment(text) {
                continue;
            }

            match script::parse_command(text) {
                Some(Command::Jump(target)) => {
                    if next_node_id.is_some() {
                        return Err(ctx.error(line.number, "character node has more than one jump"));
                    }
                    next_node_id = Some(ctx.jump_target(target, line.number)?);
                }
                Some(Command::Set { flag, value }) => {
                    set_flags.push(ctx.set_flag(flag, value, line.number)?);
                }
                Some(_) => {
                    return Err(ctx.error(
                        line.number,
                        format!("unexpected command '{}' in character node", text),
                    ));
                }
                None => {
                    let Some((who, content)) = script::split_dialogue(text) else {
                        return Err(ctx.error(
                            line.number,
                            format!("expected 'Speaker: line', found '{}'", text),
                        ));
                    };
                    match speaker {
                        Some(existing) if existing != who => {
                            return Err(ctx.error(
                                line.number,
                                format!(
                                    "speaker changes from '{}' to '{}' inside one node",
                                    existing, who
                                ),
                            ));
                        }
                        _ => speaker = Some(who),
                    }
                    lines.push(content);
                }
            }
        }

        let speaker = speaker
            .ok_or_else(|| ctx.error(block.title_line, "character node has no speaker line"))?;

        Ok(CharacterNode {
            speaker: speaker.to_string(),
            content: lines.join("\n"),
            next_node_id,
            set_flags,
        })
    }
}
