mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::report_body;
use elgar_console::authz::roles;

#[tokio::test]
async fn commanders_assign_and_unassign_volunteers() -> Result<()> {
    let t = common::setup().await?;
    let (_, commander) = t.session(roles::UNIT_COMMAND).await?;
    let (volunteer_id, volunteer) = t.session(roles::PATROL).await?;
    let uri = format!("/events/evt-100/volunteers/{}", volunteer_id);

    let (status, _) = t.send("PUT", &uri, Some(&volunteer), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "patrol lacks manage_events");

    let (status, body) = t.send("PUT", &uri, Some(&commander), None).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["event_id"], "evt-100");
    assert_eq!(body["volunteer_id"], volunteer_id.to_string());

    let (status, _) = t.send("PUT", &uri, Some(&commander), None).await?;
    assert_eq!(status, StatusCode::OK, "re-assigning is a no-op");

    let (status, list) = t
        .send("GET", "/events/evt-100/volunteers", Some(&commander), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let (status, _) = t
        .send("POST", "/action-reports", Some(&volunteer), Some(report_body("evt-100")))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = t.send("DELETE", &uri, Some(&commander), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t.send("DELETE", &uri, Some(&commander), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn assigning_unknown_user_is_not_found() -> Result<()> {
    let t = common::setup().await?;
    let (_, admin) = t.session(roles::ADMIN).await?;

    let (status, _) = t
        .send(
            "PUT",
            &format!("/events/evt-1/volunteers/{}", uuid::Uuid::new_v4()),
            Some(&admin),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
