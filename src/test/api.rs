#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::{Client, LocalResponse};
    use serde_json::{Value, json};

    use crate::relations::NO_SUBJECTS_WARNING;
    use crate::test::test_utils::{FailingSource, setup_test_client, standard_client};

    async fn body_json(response: LocalResponse<'_>) -> Value {
        let body = response.into_string().await.expect("response has a body");
        serde_json::from_str(&body).expect("response is JSON")
    }

    async fn get_json(client: &Client, uri: &str) -> (Status, Value) {
        let response = client.get(uri.to_string()).dispatch().await;
        let status = response.status();
        (status, body_json(response).await)
    }

    async fn send_json(client: &Client, method: &str, uri: &str, body: Value) -> (Status, Value) {
        let request = match method {
            "POST" => client.post(uri.to_string()),
            "PUT" => client.put(uri.to_string()),
            other => panic!("unsupported method {}", other),
        };
        let response = request
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await;
        let status = response.status();
        (status, body_json(response).await)
    }

    fn ids(list: &Value) -> Vec<&str> {
        list["items"]
            .as_array()
            .expect("items array")
            .iter()
            .map(|item| item["id"].as_str().expect("string id"))
            .collect()
    }

    #[rocket::async_test]
    async fn test_list_goals_with_related_names() {
        let client = standard_client(false).await;

        let (status, list) = get_json(&client, "/api/goals").await;

        assert_eq!(status, Status::Ok);
        assert_eq!(list["total"], 3);
        assert_eq!(list["matched"], 3);
        assert_eq!(list["loadState"]["state"], "ready");
        assert_eq!(list["capabilities"]["hardDelete"], false);
        assert_eq!(list["capabilities"]["statusUpdate"], true);

        let first = &list["items"][0];
        assert_eq!(first["id"], "g1");
        assert_eq!(first["goal"], "Master multiplication tables");
        assert_eq!(first["curriculumName"], "Competency Based Curriculum");
        assert_eq!(first["subjectName"], "Mathematics");
        assert_eq!(first["isActive"], true);
    }

    #[rocket::async_test]
    async fn test_list_filters_from_query() {
        let client = standard_client(false).await;

        let (_, list) = get_json(&client, "/api/goals?curriculumId=1&term=Term%201").await;
        assert_eq!(ids(&list), ["g1", "g2"]);
        assert_eq!(list["total"], 3);
        assert_eq!(list["matched"], 2);

        let (_, list) = get_json(&client, "/api/goals?active=false").await;
        assert_eq!(ids(&list), ["g3"]);

        let (_, list) = get_json(&client, "/api/users?search=hillside").await;
        assert_eq!(ids(&list), ["u2"]);

        let (_, list) = get_json(&client, "/api/users?school_id=i1").await;
        assert_eq!(ids(&list), ["u1"]);

        let (_, list) = get_json(&client, "/api/subjects?curriculumId=1").await;
        assert_eq!(ids(&list), ["s1", "s2"]);
        assert_eq!(list["items"][0]["curriculumId"], "1");
    }

    #[rocket::async_test]
    async fn test_get_record_and_not_found() {
        let client = standard_client(false).await;

        let (status, user) = get_json(&client, "/api/users/u3").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(user["role"], "teacher");
        assert_eq!(user["schoolName"], "Unknown");

        let (status, body) = get_json(&client, "/api/users/nobody").await;
        assert_eq!(status, Status::NotFound);
        assert_eq!(body["status"], "error");
        assert_eq!(
            body["errors"]["resource"][0],
            "Not found: user with id nobody"
        );

        let (status, body) = get_json(&client, "/api/no-such-panel").await;
        assert_eq!(status, Status::NotFound);
        assert_eq!(body["errors"]["resource"][0], "Resource not found");
    }

    #[rocket::async_test]
    async fn test_create_goal_then_duplicate() {
        let client = standard_client(false).await;
        let form = json!({
            "curriculumId": "1",
            "subjectId": "s1",
            "term": "Term 2",
            "goal": "Long division"
        });

        let (status, created) = send_json(&client, "POST", "/api/goals", form.clone()).await;
        assert_eq!(status, Status::Created);
        assert_eq!(created["goal"], "Long division");
        assert_eq!(created["subjectName"], "Mathematics");
        assert!(created["id"].as_str().is_some_and(|id| !id.is_empty()));

        let (status, body) = send_json(&client, "POST", "/api/goals", form).await;
        assert_eq!(status, Status::Conflict);
        assert_eq!(
            body["errors"]["duplicate"][0],
            "A goal already exists for this curriculum, subject and term"
        );

        let (_, list) = get_json(&client, "/api/goals").await;
        assert_eq!(list["total"], 4);
    }

    #[rocket::async_test]
    async fn test_create_reports_field_errors() {
        let client = standard_client(false).await;

        let (status, body) = send_json(
            &client,
            "POST",
            "/api/users",
            json!({ "name": "  ", "email": "not-an-email" }),
        )
        .await;

        assert_eq!(status, Status::UnprocessableEntity);
        assert_eq!(body["errors"]["name"][0], "is required");
        assert_eq!(body["errors"]["email"][0], "must be a valid email address");
        assert_eq!(body["errors"]["role"][0], "is required");

    }

    #[rocket::async_test]
    async fn test_unreadable_bodies_are_rejected() {
        let client = standard_client(false).await;

        let response = client
            .post("/api/users")
            .header(ContentType::JSON)
            .body("{not json")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(body_json(response).await["errors"]["request"][0], "Bad request");

        let (status, body) = send_json(
            &client,
            "POST",
            "/api/users",
            json!({ "name": "Wanjiru", "email": "wanjiru@example.com", "role": 5 }),
        )
        .await;
        assert_eq!(status, Status::UnprocessableEntity);
        assert_eq!(body["errors"]["request"][0], "Request body could not be parsed");

        let (_, list) = get_json(&client, "/api/users").await;
        assert_eq!(list["total"], 3);
    }

    #[rocket::async_test]
    async fn test_goal_subject_outside_curriculum_is_rejected() {
        let client = standard_client(false).await;

        let (status, body) = send_json(
            &client,
            "POST",
            "/api/goals",
            json!({
                "curriculumId": "1",
                "subjectId": "s3",
                "term": "Term 2",
                "goal": "Write a letter"
            }),
        )
        .await;

        assert_eq!(status, Status::UnprocessableEntity);
        assert_eq!(
            body["errors"]["subjectId"][0],
            "is not assigned to the selected curriculum"
        );
    }

    #[rocket::async_test]
    async fn test_update_keeps_identity() {
        let client = standard_client(false).await;

        let (status, updated) = send_json(
            &client,
            "PUT",
            "/api/institutions/i2",
            json!({
                "name": "Hillside High School",
                "code": "HSS",
                "location": "Nakuru",
                "contactEmail": "info@hillside.ac.ke"
            }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(updated["id"], "i2");
        assert_eq!(updated["name"], "Hillside High School");

        let (_, user) = get_json(&client, "/api/users/u2").await;
        assert_eq!(user["schoolName"], "Hillside High School");

        let (status, _) = send_json(
            &client,
            "PUT",
            "/api/institutions/missing",
            json!({ "name": "Ghost" }),
        )
        .await;
        assert_eq!(status, Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_subject_with_unknown_curriculum_is_rejected() {
        let client = standard_client(false).await;

        let (status, body) = send_json(
            &client,
            "POST",
            "/api/subjects",
            json!({ "name": "Chemistry", "curriculumId": "99" }),
        )
        .await;

        assert_eq!(status, Status::UnprocessableEntity);
        assert_eq!(body["errors"]["curriculumId"][0], "does not match a curriculum");
    }

    #[rocket::async_test]
    async fn test_delete_is_soft_by_default() {
        let client = standard_client(false).await;

        let response = client.delete("/api/goals/g1").dispatch().await;
        assert_eq!(response.status(), Status::NotImplemented);
        let body = body_json(response).await;
        assert_eq!(
            body["errors"]["operation"][0],
            "Deleting a goal is not available; deactivate it instead"
        );

        let response = client.post("/api/goals/g1/toggle").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(body_json(response).await["isActive"], false);

        let (_, list) = get_json(&client, "/api/goals?active=true").await;
        assert_eq!(ids(&list), ["g2"]);
    }

    #[rocket::async_test]
    async fn test_hard_delete_when_enabled() {
        let client = standard_client(true).await;

        let response = client.delete("/api/subjects/s2").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(body_json(response).await["name"], "English");

        let (status, _) = get_json(&client, "/api/subjects/s2").await;
        assert_eq!(status, Status::NotFound);

        let (_, goal) = get_json(&client, "/api/goals/g2").await;
        assert_eq!(goal["subjectName"], "Unknown");

        let (_, dashboard) = get_json(&client, "/api/dashboard").await;
        assert_eq!(dashboard["relations"], 2);
    }

    #[rocket::async_test]
    async fn test_subject_options_for_curriculum() {
        let client = standard_client(false).await;

        let (status, options) = get_json(&client, "/api/curricula/1/subjects").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(options["subjects"].as_array().map(Vec::len), Some(2));
        assert_eq!(options["warning"], Value::Null);

        let (_, options) = get_json(&client, "/api/curricula/3/subjects").await;
        assert_eq!(options["subjects"], json!([]));
        assert_eq!(options["warning"], NO_SUBJECTS_WARNING);

        let (status, _) = get_json(&client, "/api/curricula/99/subjects").await;
        assert_eq!(status, Status::NotFound);

        let (status, curricula) = get_json(&client, "/api/subjects/s3/curricula").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(curricula[0]["code"], "844");
    }

    #[rocket::async_test]
    async fn test_export_users_csv() {
        let client = standard_client(false).await;

        let response = client.get("/api/export/users.csv").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert!(response.content_type().is_some_and(|ct| ct.is_csv()));
        assert_eq!(
            response.headers().get_one("Content-Disposition"),
            Some("attachment; filename=\"users.csv\"")
        );

        let body = response.into_string().await.unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "Name,Email,Phone,Role,School,Status,Last Login");
        assert_eq!(lines.len(), 4);
        assert!(lines[3].ends_with("Teacher,Unknown,Inactive,Never"));

        let response = client
            .get("/api/export/users.csv?active=true&schoolId=i2")
            .dispatch()
            .await;
        let body = response.into_string().await.unwrap();
        assert_eq!(body.lines().count(), 2);
        assert!(body.contains("Brian Kamau"));
    }

    #[rocket::async_test]
    async fn test_dashboard_and_activity() {
        let client = standard_client(false).await;

        client.post("/api/users/u2/toggle").dispatch().await;

        let (status, dashboard) = get_json(&client, "/api/dashboard").await;
        assert_eq!(status, Status::Ok);
        let panels = dashboard["panels"].as_array().expect("panels");
        assert_eq!(panels.len(), 6);
        let users = panels
            .iter()
            .find(|panel| panel["kind"] == "user")
            .expect("users panel");
        assert_eq!(users["total"], 3);
        assert_eq!(users["active"], 1);
        assert_eq!(dashboard["relations"], 3);

        let (_, activity) = get_json(&client, "/api/activity?limit=1").await;
        assert_eq!(activity.as_array().map(Vec::len), Some(1));
        assert_eq!(activity[0]["kind"], "user");
        assert_eq!(activity[0]["id"], "u2");
        assert_eq!(activity[0]["change"], json!({ "type": "toggled", "active": false }));
    }

    #[rocket::async_test]
    async fn test_health_and_reload() {
        let client = standard_client(false).await;

        let (status, health) = get_json(&client, "/api/health").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(health["status"], "OK");
        assert_eq!(health["source"], "standard");

        let response = client.post("/api/reload").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let report = body_json(response).await;
        assert_eq!(report["loaded"]["users"], 3);
        assert_eq!(report["loaded"]["relations"], 3);
        assert_eq!(report["failed"], json!({}));
    }

    #[rocket::async_test]
    async fn test_unreachable_source() {
        let client = setup_test_client(Arc::new(FailingSource)).await;

        let (status, list) = get_json(&client, "/api/users").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(list["total"], 0);
        assert_eq!(list["loadState"]["state"], "failed");
        assert!(list["loadState"]["message"]
            .as_str()
            .is_some_and(|message| message.contains("users is down")));

        let response = client.post("/api/reload").dispatch().await;
        assert_eq!(response.status(), Status::ServiceUnavailable);
        let report = body_json(response).await;
        assert!(report["failed"]["goals"].is_string());
    }
}
