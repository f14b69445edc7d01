//! `Target` domain handlers.
//!
//! Discovery (`getTargets`, `getTargetInfo`, `setDiscoverTargets`),
//! attachment (`attachToTarget`, `attachToBrowserTarget`, `setAutoAttach`,
//! `detachFromTarget`) and provider pass-throughs (`createTarget`,
//! `closeTarget`).
//!
//! Handlers that emit events do so through the [`Coordinator`], except
//! `attachToTarget` whose `Target.attachedToTarget` must follow its response.
//!
//! [`Coordinator`]: crate::coordinator::Coordinator

use cdpmux_protocol::target::{
	ATTACHED_TO_TARGET, AttachToTargetParams, AttachToTargetResult, AttachedToTarget, CloseTargetParams,
	CloseTargetResult, CreateTargetParams, CreateTargetResult, DetachFromTargetParams, GetTargetInfoParams,
	GetTargetInfoResult, GetTargetsResult, SetAutoAttachParams, SetDiscoverTargetsParams,
};
use cdpmux_protocol::ProtocolError;
use serde_json::{Value, json};

use super::{parse_params, to_result};
use crate::context::SessionContext;
use crate::dispatcher::{CommandResult, Domain};
use crate::error::Error;
use crate::session::{AutoAttach, SessionKind};

/// Builds the `Target` domain.
pub fn domain() -> Domain<SessionContext> {
	Domain::<SessionContext>::new("Target")
		.method("getTargets", get_targets)
		.method("getTargetInfo", get_target_info)
		.method("attachToBrowserTarget", attach_to_browser_target)
		.method("setAutoAttach", set_auto_attach)
		.method("setDiscoverTargets", set_discover_targets)
		.method("attachToTarget", attach_to_target)
		.method("detachFromTarget", detach_from_target)
		.method("createTarget", create_target)
		.method("closeTarget", close_target)
}

async fn get_targets(_params: Value, ctx: SessionContext) -> CommandResult {
	let target_infos = ctx.provider().targets().iter().map(|target| target.target_info()).collect();
	to_result(&GetTargetsResult { target_infos })
}

async fn get_target_info(params: Value, ctx: SessionContext) -> CommandResult {
	let params: GetTargetInfoParams = parse_params(params)?;
	let target_id = params.target_id.unwrap_or_else(|| ctx.session().target_id().clone());
	let target = ctx
		.provider()
		.get_target(&target_id)
		.ok_or(Error::UnknownTarget(target_id))?;
	to_result(&GetTargetInfoResult {
		target_info: target.target_info(),
	})
}

async fn attach_to_browser_target(_params: Value, ctx: SessionContext) -> CommandResult {
	let coordinator = ctx.coordinator();
	let session = coordinator.create_session(
		coordinator.browser_target_id(),
		SessionKind::Browser,
		Some(ctx.session().id().clone()),
	)?;
	to_result(&AttachToTargetResult {
		session_id: session.id().clone(),
	})
}

async fn set_auto_attach(params: Value, ctx: SessionContext) -> CommandResult {
	let params: SetAutoAttachParams = parse_params(params)?;
	let flags = AutoAttach {
		auto_attach: params.auto_attach,
		wait_for_debugger_on_start: params.wait_for_debugger_on_start,
		flatten: params.flatten,
	};
	let session = ctx.session();
	session.set_auto_attach(flags);

	if !flags.is_flat() || session.kind() != SessionKind::Browser || session.page_attached() {
		return Ok(json!({}));
	}

	let coordinator = ctx.coordinator();
	for target in ctx.provider().targets() {
		let info = target.target_info();
		coordinator.announce_target(session, &info);
		if !session.page_attached() {
			if let Err(err) = coordinator.auto_attach_page(session, &info) {
				tracing::warn!(target_id = %info.target_id, error = %err, "auto-attach failed");
				return Err(err.into());
			}
		}
	}
	Ok(json!({}))
}

async fn set_discover_targets(params: Value, ctx: SessionContext) -> CommandResult {
	let params: SetDiscoverTargetsParams = parse_params(params)?;
	let session = ctx.session();
	session.set_discover_targets(params.discover);
	if params.discover {
		for target in ctx.provider().targets() {
			ctx.coordinator().announce_target(session, &target.target_info());
		}
	}
	Ok(json!({}))
}

async fn attach_to_target(params: Value, ctx: SessionContext) -> CommandResult {
	let params: AttachToTargetParams = parse_params(params)?;
	if params.flatten == Some(false) {
		tracing::debug!(target_id = %params.target_id, "non-flat attach requested, using a flat session");
	}
	let Some(target) = ctx.provider().get_target(&params.target_id) else {
		return Err(Error::UnknownTarget(params.target_id).into());
	};

	let parent = ctx.session().id().clone();
	let session = ctx
		.coordinator()
		.create_session(params.target_id, SessionKind::Page, Some(parent))?;
	let target_info = target.target_info().with_attached(true);

	ctx.emit_after_response(
		ATTACHED_TO_TARGET,
		&AttachedToTarget {
			session_id: session.id().clone(),
			target_info,
			waiting_for_debugger: false,
		},
	);
	to_result(&AttachToTargetResult {
		session_id: session.id().clone(),
	})
}

async fn detach_from_target(params: Value, ctx: SessionContext) -> CommandResult {
	let params: DetachFromTargetParams = parse_params(params)?;
	let session_id = match (params.session_id, params.target_id) {
		(Some(session_id), _) => session_id,
		(None, Some(target_id)) => ctx
			.coordinator()
			.sessions()
			.into_iter()
			.find(|session| {
				session.kind() == SessionKind::Page
					&& session.target_id() == &target_id
					&& session.parent() == Some(ctx.session().id())
			})
			.map(|session| session.id().clone())
			.ok_or(Error::UnknownTarget(target_id))?,
		(None, None) => {
			return Err(ProtocolError::server("Either sessionId or targetId must be specified"));
		}
	};
	ctx.coordinator().detach_session(&session_id)?;
	if ctx.session().is_disposed() {
		// The caller detached itself or an ancestor.
		ctx.answer_after_detach();
	}
	Ok(json!({}))
}

async fn create_target(params: Value, ctx: SessionContext) -> CommandResult {
	let params: CreateTargetParams = parse_params(params)?;
	let target_id = ctx
		.provider()
		.create_target(&params.url, params.browser_context_id.as_deref())
		.await
		.inspect_err(|err| tracing::warn!(url = %params.url, error = %err, "createTarget failed"))?;
	to_result(&CreateTargetResult { target_id })
}

async fn close_target(params: Value, ctx: SessionContext) -> CommandResult {
	let params: CloseTargetParams = parse_params(params)?;
	if ctx.provider().get_target(&params.target_id).is_none() {
		return Err(Error::UnknownTarget(params.target_id).into());
	}
	let success = ctx
		.provider()
		.close_target(&params.target_id)
		.await
		.inspect_err(|err| tracing::warn!(target_id = %params.target_id, error = %err, "closeTarget failed"))?;
	to_result(&CloseTargetResult { success })
}
