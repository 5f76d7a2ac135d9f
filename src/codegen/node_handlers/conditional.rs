//! Conditional branches: a single `<<if>>` / `<<elseif>>` / `<<else>>` /
//! `<<endif>>` chain, one branch per [`ConditionalBlock`].

use super::{ImportContext, NodeHandler};
use crate::codegen::BlockBuilder;
use crate::condition::{format_conditions, Condition};
use crate::error::{CompileError, NodeImportError};
use crate::graph::{BlockKind, ConditionalBlock, ConditionalNode, NodeId, NodeKind};
use crate::script::{self, parse_directive, Command, Directive, ScriptBlock};

const BLOCK_DIRECTIVE: &str = "block";

pub struct ConditionalHandler;

/// A branch being read, not yet checked
struct OpenBranch {
    line: usize,
    id: Option<String>,
    kind: BlockKind,
    condition: Option<Vec<Condition>>,
    speaker: Option<String>,
    narration: bool,
    lines: Vec<String>,
    next_node_id: Option<NodeId>,
}

impl OpenBranch {
    fn new(line: usize, kind: BlockKind, condition: Option<Vec<Condition>>) -> Self {
        Self {
            line,
            id: None,
            kind,
            condition,
            speaker: None,
            narration: false,
            lines: Vec::new(),
            next_node_id: None,
        }
    }

    fn is_untouched(&self) -> bool {
        self.id.is_none() && self.lines.is_empty() && self.next_node_id.is_none()
    }

    fn finish(self, index: usize, ctx: &ImportContext<'_>) -> Result<ConditionalBlock, NodeImportError> {
        let id = self
            .id
            .unwrap_or_else(|| format!("{}-block-{}", ctx.node_id, index + 1));
        let mut block = ConditionalBlock::new(id, self.kind, self.condition, self.lines.join("\n"))
            .map_err(|reason| ctx.error(self.line, reason))?;
        block.speaker = self.speaker;
        block.next_node_id = self.next_node_id;
        Ok(block)
    }
}

impl NodeHandler for ConditionalHandler {
    type Payload = ConditionalNode;

    const KIND: NodeKind = NodeKind::Conditional;

    fn export_node(
        &self,
        node: &ConditionalNode,
        builder: &mut BlockBuilder,
    ) -> Result<(), CompileError> {
        if node.blocks.is_empty() {
            return Ok(());
        }

        for block in &node.blocks {
            match block.kind {
                BlockKind::Else => builder.line("<<else>>"),
                kind => builder.line(format!(
                    "<<{} {}>>",
                    kind.keyword(),
                    format_conditions(block.conditions())
                )),
            };

            if let Some(speaker) = &block.speaker {
                if !script::is_speaker(speaker) {
                    return Err(CompileError::invalid_identifier("speaker", speaker));
                }
            }

            builder
                .indent()
                .directive(&Directive::new(BLOCK_DIRECTIVE).attr("id", &block.id))
                .dialogue(block.speaker.as_deref(), &block.content)
                .jump(block.next_node_id.as_deref())
                .dedent();
        }
        builder.line("<<endif>>");
        Ok(())
    }

    fn import_node(
        &self,
        block: &ScriptBlock,
        ctx: &mut ImportContext<'_>,
    ) -> Result<ConditionalNode, NodeImportError> {
        let mut blocks: Vec<ConditionalBlock> = Vec::new();
        let mut open: Option<OpenBranch> = None;
        let mut seen_if = false;
        let mut closed = false;

        for line in block.meaningful_lines() {
            let text = line.text.as_str();
            if closed {
                return Err(ctx.error(line.number, format!("unexpected line '{}' after <<endif>>", text)));
            }

            if let Some(directive) = parse_directive(text) {
                let directive = directive.map_err(|reason| ctx.error(line.number, reason))?;
                match open.as_mut() {
                    Some(branch) if directive.name == BLOCK_DIRECTIVE && branch.is_untouched() => {
                        let id = directive.get("id").filter(|id| !id.is_empty()).ok_or_else(|| {
                            ctx.error(line.number, "@block directive needs an id")
                        })?;
                        branch.id = Some(id.to_string());
                    }
                    _ => {
                        return Err(ctx.error(
                            line.number,
                            format!("unexpected @{} directive in conditional node", directive.name),
                        ));
                    }
                }
                continue;
            }

            let command = script::parse_command(text);
            match command {
                Some(Command::If(condition)) => {
                    if seen_if {
                        return Err(ctx.error(line.number, "nested <<if>> inside a conditional node"));
                    }
                    seen_if = true;
                    let conditions = ctx.parse_conditions(condition, line.number)?;
                    open = Some(OpenBranch::new(line.number, BlockKind::If, Some(conditions)));
                }
                Some(Command::ElseIf(condition)) => {
                    let branch = take_branch(&mut open, ctx, line.number, "<<elseif>>")?;
                    blocks.push(branch.finish(blocks.len(), ctx)?);
                    let conditions = ctx.parse_conditions(condition, line.number)?;
                    open = Some(OpenBranch::new(line.number, BlockKind::ElseIf, Some(conditions)));
                }
                Some(Command::Else) => {
                    let branch = take_branch(&mut open, ctx, line.number, "<<else>>")?;
                    blocks.push(branch.finish(blocks.len(), ctx)?);
                    open = Some(OpenBranch::new(line.number, BlockKind::Else, None));
                }
                Some(Command::EndIf) => {
                    let branch = take_branch(&mut open, ctx, line.number, "<<endif>>")?;
                    blocks.push(branch.finish(blocks.len(), ctx)?);
                    closed = true;
                }
                Some(Command::Jump(target)) => {
                    let target = ctx.jump_target(target, line.number)?;
                    let branch = current(&mut open, ctx, line.number)?;
                    if branch.next_node_id.is_some() {
                        return Err(ctx.error(line.number, "branch has more than one jump"));
                    }
                    branch.next_node_id = Some(target);
                }
                Some(_) => {
                    return Err(ctx.error(
                        line.number,
                        format!("unexpected command '{}' in conditional node", text),
                    ));
                }
                None if script::is_comment(text) => {}
                None if text.starts_with("->") => {
                    return Err(ctx.error(line.number, "choice line inside a conditional node"));
                }
                None => {
                    let branch = current(&mut open, ctx, line.number)?;
                    if branch.next_node_id.is_some() {
                        return Err(ctx.error(line.number, "content after <<jump>> in branch"));
                    }
                    add_content(branch, text, line.number, ctx)?;
                }
            }
        }

        if let Some(branch) = open {
            return Err(ctx.error(branch.line, "<<if>> is never closed with <<endif>>"));
        }
        if blocks.is_empty() {
            return Err(ctx.error(block.title_line, "conditional node has no branches"));
        }
        Ok(ConditionalNode { blocks })
    }
}

fn take_branch(
    open: &mut Option<OpenBranch>,
    ctx: &ImportContext<'_>,
    line: usize,
    keyword: &str,
) -> Result<OpenBranch, NodeImportError> {
    let branch = open
        .take()
        .ok_or_else(|| ctx.error(line, format!("{} without <<if>>", keyword)))?;
    if branch.kind == BlockKind::Else && keyword != "<<endif>>" {
        return Err(ctx.error(line, format!("{} after <<else>>", keyword)));
    }
    Ok(branch)
}

fn current<'b>(
    open: &'b mut Option<OpenBranch>,
    ctx: &ImportContext<'_>,
    line: usize,
) -> Result<&'b mut OpenBranch, NodeImportError> {
    open.as_mut()
        .ok_or_else(|| ctx.error(line, "conditional content outside <<if>> ... <<endif>>"))
}

/// Either `Speaker: text` or escaped narration; one branch cannot mix the two
fn add_content(
    branch: &mut OpenBranch,
    text: &str,
    line: usize,
    ctx: &ImportContext<'_>,
) -> Result<(), NodeImportError> {
    match script::split_dialogue(text) {
        Some((speaker, content)) => {
            if branch.narration {
                return Err(ctx.error(line, "branch mixes narration and dialogue"));
            }
            match &branch.speaker {
                Some(existing) if existing != speaker => {
                    return Err(ctx.error(
                        line,
                        format!("speaker changes from '{}' to '{}' inside one branch", existing, speaker),
                    ));
                }
                Some(_) => {}
                None => branch.speaker = Some(speaker.to_string()),
            }
            branch.lines.push(content);
        }
        None => {
            if branch.speaker.is_some() {
                return Err(ctx.error(line, "branch mixes narration and dialogue"));
            }
            branch.narration = true;
            branch.lines.push(script::unescape(text));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ConditionOperator, ConditionParser};
    use crate::script::split_script;
    use pretty_assertions::assert_eq;

    fn three_way() -> ConditionalNode {
        ConditionalNode {
            blocks: vec![
                ConditionalBlock::new(
                    "rich",
                    BlockKind::If,
                    Some(vec![Condition::compare("gold", ConditionOperator::GreaterThan, 100)]),
                    "Fine wine for you.",
                )
                .unwrap()
                .with_speaker("Barkeep")
                .with_next("cellar"),
                ConditionalBlock::new(
                    "regular",
                    BlockKind::ElseIf,
                    Some(vec![Condition::is_set("regular"), Condition::is_not_set("banned")]),
                    "The usual?",
                )
                .unwrap()
                .with_speaker("Barkeep"),
                ConditionalBlock::new("other", BlockKind::Else, None, "The barkeep ignores you.\n-- nothing more")
                    .unwrap()
                    .with_next("street"),
            ],
        }
    }

    fn export(node: &ConditionalNode) -> String {
        let mut builder = BlockBuilder::start_node("check");
        ConditionalHandler.export_node(node, &mut builder).unwrap();
        builder.end_node()
    }

    fn import(text: &str) -> Result<ConditionalNode, NodeImportError> {
        let block = split_script(text).unwrap().blocks.remove(0);
        let mut warnings = Vec::new();
        let mut ctx = ImportContext::new("check", ConditionParser::lenient(), &mut warnings);
        ConditionalHandler.import_node(&block, &mut ctx)
    }

    #[test]
    fn exports_one_chain_with_a_single_endif() {
        let text = export(&three_way());
        assert_eq!(text.matches("<<if ").count(), 1);
        assert_eq!(text.matches("<<elseif ").count(), 1);
        assert_eq!(text.matches("<<else>>").count(), 1);
        assert_eq!(text.matches("<<endif>>").count(), 1);
        assert!(text.contains("<<elseif $regular and not $banned>>"));
    }

    #[test]
    fn branches_round_trip() {
        let node = three_way();
        assert_eq!(import(&export(&node)).unwrap(), node);
    }

    #[test]
    fn missing_block_ids_are_synthesized() {
        let node = import("title: check\n---\n<<if $a>>\nBob: A\n<<else>>\nBob: B\n<<endif>>\n===").unwrap();
        assert_eq!(node.blocks[0].id, "check-block-1");
        assert_eq!(node.blocks[1].id, "check-block-2");
        assert_eq!(node.blocks[1].condition, None);
    }

    #[test]
    fn malformed_chains_fail() {
        let err = import("title: check\n---\n<<if $a>>\nBob: A\n===").unwrap_err();
        assert!(err.reason.contains("never closed"));

        let err = import("title: check\n---\n<<if $a>>\n<<else>>\n<<elseif $b>>\n<<endif>>\n===")
            .unwrap_err();
        assert!(err.reason.contains("after <<else>>"));

        let err = import("title: check\n---\n<<if $a>>\nBob: A\nAnn: B\n<<endif>>\n===").unwrap_err();
        assert_eq!(err.line, 5);

        let err = import("title: check\n---\n<<if $a>>\n<<endif>>\nBob: late\n===").unwrap_err();
        assert!(err.reason.contains("after <<endif>>"));
    }
}
