use actix_web::{get, post, web, HttpResponse};
use serde_json::json;
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::balance::compute_group_balance;
use crate::error::{ApiError, LedgerError};
use crate::requests::{
    AddMemberRequest, CreateExpenseRequest, CreateGroupRequest, CreateSettlementRequest,
};
use crate::schemas::Group;
use crate::store::{LedgerStore, MongoStore};

async fn require_group(store: &MongoStore, group_id: &str) -> Result<Group, ApiError> {
    store
        .fetch_group(group_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("group {group_id}")).into())
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

#[post("/groups")]
async fn create_group(
    user: AuthenticatedUser,
    store: web::Data<MongoStore>,
    json: web::Json<CreateGroupRequest>,
) -> Result<HttpResponse, ApiError> {
    let group = json.into_inner().into_group(&user.0)?;
    store.insert_group(&group).await?;
    info!(group_id = %group.id, members = group.members.len(), "group created");
    Ok(HttpResponse::Created().json(group))
}

#[get("/groups/{id}")]
async fn get_group(
    _user: AuthenticatedUser,
    store: web::Data<MongoStore>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let group = require_group(&store, &id).await?;
    Ok(HttpResponse::Ok().json(group))
}

#[post("/groups/{id}/members")]
async fn add_member(
    _user: AuthenticatedUser,
    store: web::Data<MongoStore>,
    id: web::Path<String>,
    json: web::Json<AddMemberRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut group = require_group(&store, &id).await?;
    let member = json.into_inner().into_member(&group)?;
    store.add_member(&group.id, &member).await?;
    info!(group_id = %group.id, user_id = %member.user_id, "member added");
    group.members.push(member);
    Ok(HttpResponse::Created().json(json!({
        "groupId": group.id,
        "members": group.members,
    })))
}

#[post("/groups/{id}/expenses")]
async fn add_expense(
    _user: AuthenticatedUser,
    store: web::Data<MongoStore>,
    id: web::Path<String>,
    json: web::Json<CreateExpenseRequest>,
) -> Result<HttpResponse, ApiError> {
    let group = require_group(&store, &id).await?;
    let expense = json.into_inner().into_expense(&group)?;
    store.insert_expense(&expense).await?;
    info!(
        group_id = %group.id,
        expense_id = %expense.id,
        total_cents = expense.total_cents,
        split_type = %expense.split_type,
        "expense recorded"
    );
    Ok(HttpResponse::Created().json(expense))
}

#[post("/groups/{id}/settlements")]
async fn add_settlement(
    _user: AuthenticatedUser,
    store: web::Data<MongoStore>,
    id: web::Path<String>,
    json: web::Json<CreateSettlementRequest>,
) -> Result<HttpResponse, ApiError> {
    let group = require_group(&store, &id).await?;
    let settlement = json.into_inner().into_settlement(&group)?;
    store.insert_settlement(&settlement).await?;
    info!(
        group_id = %group.id,
        from = %settlement.from_user_id,
        to = %settlement.to_user_id,
        amount_cents = settlement.amount_cents,
        "settlement recorded"
    );
    Ok(HttpResponse::Created().json(settlement))
}

#[get("/groups/{id}/balances")]
async fn get_balances(
    _user: AuthenticatedUser,
    store: web::Data<MongoStore>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let balance = compute_group_balance(store.get_ref(), &id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

#[get("/groups/{id}/ledger")]
async fn get_ledger(
    _user: AuthenticatedUser,
    store: web::Data<MongoStore>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let group = require_group(&store, &id).await?;
    let expenses = store.fetch_expenses(&group.id).await?;
    let settlements = store.fetch_settlements(&group.id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "expenses": expenses,
        "settlements": settlements,
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        ApiError::from(LedgerError::validation(err.to_string())).into()
    }))
    .service(health)
    .service(create_group)
    .service(get_group)
    .service(add_member)
    .service(add_expense)
    .service(add_settlement)
    .service(get_balances)
    .service(get_ledger);
}
