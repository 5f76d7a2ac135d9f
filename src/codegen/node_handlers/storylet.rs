//! Storylet calls and pools.
//!
//! The dialect has no sub-routine call, so both payloads travel as `// @...`
//! directives. Keys the model does not know are kept in `attributes` and
//! written back in key order.

use super::{ImportContext, NodeHandler};
use crate::codegen::BlockBuilder;
use crate::error::{CompileError, NodeImportError};
use crate::graph::{NodeKind, PoolMember, StoryletNode, StoryletPoolNode};
use crate::script::{self, parse_directive, Command, Directive, ScriptBlock, POOL_KEYS, STORYLET_KEYS};
use std::collections::BTreeMap;
use std::str::FromStr;

pub const STORYLET_DIRECTIVE: &str = "storylet";
pub const POOL_DIRECTIVE: &str = "storylet_pool";
pub const MEMBER_DIRECTIVE: &str = "member";

pub struct StoryletHandler;

pub struct StoryletPoolHandler;

fn with_attributes(mut directive: Directive, attributes: &BTreeMap<String, String>) -> Directive {
    for (key, value) in attributes {
        directive = directive.attr(key, value);
    }
    directive
}

fn extra_attributes(directive: &Directive, known: &[&str]) -> BTreeMap<String, String> {
    directive
        .extra(known)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Parse an optional policy value, falling back to its default
fn policy<T: FromStr + Default>(
    directive: &Directive,
    key: &str,
    line: usize,
    ctx: &ImportContext<'_>,
) -> Result<T, NodeImportError> {
    match directive.get(key) {
        None => Ok(T::default()),
        Some(value) => value
            .parse()
            .map_err(|_| ctx.error(line, format!("unknown {} value '{}'", key, value))),
    }
}

fn required<'d>(
    directive: &'d Directive,
    key: &str,
    line: usize,
    ctx: &ImportContext<'_>,
) -> Result<&'d str, NodeImportError> {
    directive
        .get(key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ctx.error(line, format!("@{} directive needs '{}'", directive.name, key)))
}

impl NodeHandler for StoryletHandler {
    type Payload = StoryletNode;

    const KIND: NodeKind = NodeKind::Storylet;

    fn export_node(&self, node: &StoryletNode, builder: &mut BlockBuilder) -> Result<(), CompileError> {
        let directive = Directive::new(STORYLET_DIRECTIVE)
            .attr("template", &node.template_id)
            .attr("entry", node.entry_policy.as_str())
            .attr_opt("entry_node", node.entry_node_id.as_deref())
            .attr("return", node.return_policy.as_str())
            .attr_opt("return_node", node.return_node_id.as_deref());
        builder.directive(&with_attributes(directive, &node.attributes));
        Ok(())
    }

    fn import_node(
        &self,
        block: &ScriptBlock,
        ctx: &mut ImportContext<'_>,
    ) -> Result<StoryletNode, NodeImportError> {
        let mut node = None;

        for line in block.meaningful_lines() {
            let directive = match parse_directive(&line.text) {
                Some(Ok(directive)) if directive.name == STORYLET_DIRECTIVE => directive,
                Some(Err(reason)) => return Err(ctx.error(line.number, reason)),
                _ => {
                    return Err(ctx.error(
                        line.number,
                        format!("unexpected line '{}' in storylet node", line.text),
                    ));
                }
            };
            if node.is_some() {
                return Err(ctx.error(line.number, "storylet node has more than one @storylet"));
            }

            node = Some(StoryletNode {
                template_id: required(&directive, "template", line.number, ctx)?.to_string(),
                entry_policy: policy(&directive, "entry", line.number, ctx)?,
                entry_node_id: directive.get("entry_node").map(str::to_string),
                return_policy: policy(&directive, "return", line.number, ctx)?,
                return_node_id: directive.get("return_node").map(str::to_string),
                attributes: extra_attributes(&directive, STORYLET_KEYS),
            });
        }

        node.ok_or_else(|| ctx.error(block.title_line, "storylet node has no @storylet directive"))
    }
}

impl NodeHandler for StoryletPoolHandler {
    type Payload = StoryletPoolNode;

    const KIND: NodeKind = NodeKind::StoryletPool;

    fn export_node(
        &self,
        node: &StoryletPoolNode,
        builder: &mut BlockBuilder,
    ) -> Result<(), CompileError> {
        let directive = Directive::new(POOL_DIRECTIVE)
            .attr("pool", &node.pool_id)
            .attr("selection", node.selection_mode.as_str());
        builder.directive(&with_attributes(directive, &node.attributes));
        for member in &node.members {
            builder.directive(
                &Directive::new(MEMBER_DIRECTIVE)
                    .attr("template", &member.template_id)
                    .attr("weight", member.weight.to_string()),
            );
        }
        builder.jump(node.next_node_id.as_deref());
        Ok(())
    }

    fn import_node(
        &self,
        block: &ScriptBlock,
        ctx: &mut ImportContext<'_>,
    ) -> Result<StoryletPoolNode, NodeImportError> {
        let mut pool: Option<StoryletPoolNode> = None;
        let mut members = Vec::new();
        let mut next_node_id = None;

        for line in block.meaningful_lines() {
            if let Some(Command::Jump(target)) = script::parse_command(&line.text) {
                if next_node_id.is_some() {
                    return Err(ctx.error(line.number, "storylet pool has more than one jump"));
                }
                next_node_id = Some(ctx.jump_target(target, line.number)?);
                continue;
            }
            if next_node_id.is_some() {
                return Err(ctx.error(line.number, "storylet pool continues after its jump"));
            }

            let directive = match parse_directive(&line.text) {
                Some(Ok(directive)) => directive,
                Some(Err(reason)) => return Err(ctx.error(line.number, reason)),
                None => {
                    return Err(ctx.error(
                        line.number,
                        format!("unexpected line '{}' in storylet pool", line.text),
                    ));
                }
            };

            match directive.name.as_str() {
                POOL_DIRECTIVE if pool.is_none() => {
                    pool = Some(StoryletPoolNode {
                        pool_id: required(&directive, "pool", line.number, ctx)?.to_string(),
                        selection_mode: policy(&directive, "selection", line.number, ctx)?,
                        members: Vec::new(),
                        next_node_id: None,
                        attributes: extra_attributes(&directive, POOL_KEYS),
                    });
                }
                POOL_DIRECTIVE => {
                    return Err(ctx.error(line.number, "storylet pool has more than one @storylet_pool"));
                }
                MEMBER_DIRECTIVE => {
                    if let Some((key, _)) = directive.extra(&["template", "weight"]).next() {
                        return Err(ctx.error(line.number, format!("unknown @member key '{}'", key)));
                    }
                    let weight = match directive.get("weight") {
                        None => 1,
                        Some(raw) => raw.parse::<u32>().map_err(|_| {
                            ctx.error(line.number, format!("invalid member weight '{}'", raw))
                        })?,
                    };
                    members.push(PoolMember {
                        template_id: required(&directive, "template", line.number, ctx)?.to_string(),
                        weight,
                    });
                }
                other => {
                    return Err(ctx.error(
                        line.number,
                        format!("unexpected @{} directive in storylet pool", other),
                    ));
                }
            }
        }

        let mut pool = pool.ok_or_else(|| {
            ctx.error(block.title_line, "storylet pool has no @storylet_pool directive")
        })?;
        pool.members = members;
        pool.next_node_id = next_node_id;
        Ok(pool)
    }
}
