//! Attribute query command.

use anyhow::{Context, Result};
use tessera::{AttributeAuthority, RequestContext};
use tracing::debug;

use super::load_project;
use crate::table::print_attribute_table;

pub struct QueryArgs {
    pub project: String,
    pub principal: String,
    pub requester: Option<String>,
    pub issuer: Option<String>,
    pub attributes: Vec<String>,
    pub unfiltered: bool,
    pub json: bool,
}

pub fn run(args: &QueryArgs) -> Result<()> {
    let config = load_project(&args.project)?;
    let authority =
        AttributeAuthority::from_config(&config).context("Failed to build attribute authority")?;

    let mut ctx = RequestContext::new(&args.principal)
        .with_requested_attributes(args.attributes.iter().cloned());
    ctx.recipient.clone_from(&args.requester);
    ctx.issuer.clone_from(&args.issuer);

    if args.unfiltered {
        authority.resolve(&mut ctx)?;
    } else {
        authority.release(&mut ctx)?;
    }

    let attributes = if args.unfiltered {
        &ctx.resolved_attributes
    } else {
        &ctx.released_attributes
    };
    debug!(
        resolved = ctx.resolved_attributes.len(),
        shown = attributes.len(),
        "Query complete"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(attributes)?);
    } else {
        print_attribute_table(attributes);
    }

    Ok(())
}
