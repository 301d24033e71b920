use serde_json::json;

use crate::common::{TestApp, routes};

mod authentication {
    use super::*;

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::USER_INFO).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get_with_token(routes::USER_INFO, "not.a.jwt").await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
        assert_eq!(res.body["msg"], "Token is not valid");
    }

    #[tokio::test]
    async fn token_signed_with_another_secret_is_rejected() {
        let app = TestApp::spawn().await;
        let forged = vidhost::utils::jwt::sign(
            1,
            "admin@example.com",
            "admin",
            vec!["user:view_all".into()],
            "some-other-secret",
            3600,
        )
        .unwrap();

        let res = app.get_with_token(routes::USERS, &forged).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }
}

mod profile {
    use super::*;

    #[tokio::test]
    async fn own_profile_hides_secrets() {
        let app = TestApp::spawn().await;
        let token = app.user_token().await;

        let res = app.get_with_token(routes::USER_INFO, &token).await;

        assert_eq!(res.status, 200, "{}", res.text);
        let data = &res.body["data"];
        assert_eq!(data["email"], "viewer@example.com");
        assert_eq!(data["role"], "user");
        assert_eq!(data["isVerified"], true);
        assert!(data.get("password").is_none());
        assert!(data.get("emailVerificationOtp").is_none());
        assert!(data.get("resetPasswordOtp").is_none());
    }

    #[tokio::test]
    async fn edit_replaces_only_non_blank_fields() {
        let app = TestApp::spawn().await;
        let token = app.user_token().await;
        app.put_with_token(
            routes::USER_EDIT,
            &json!({"name": "Viewer", "country": "Ghana", "city": "Accra"}),
            &token,
        )
        .await;

        let res = app
            .put_with_token(
                routes::USER_EDIT,
                &json!({"name": "  ", "city": "Kumasi"}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        let data = &res.body["data"];
        assert_eq!(data["name"], "Viewer");
        assert_eq!(data["country"], "Ghana");
        assert_eq!(data["city"], "Kumasi");
    }

    #[tokio::test]
    async fn overlong_name_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.user_token().await;

        let res = app
            .put_with_token(routes::USER_EDIT, &json!({"name": "x".repeat(101)}), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod administration {
    use super::*;

    #[tokio::test]
    async fn regular_user_cannot_list_users() {
        let app = TestApp::spawn().await;
        let token = app.user_token().await;

        let res = app.get_with_token(routes::USERS, &token).await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
        assert_eq!(res.body["msg"], "Access denied. Admins only.");
    }

    #[tokio::test]
    async fn admin_lists_users_with_pagination() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        for i in 0..4 {
            app.create_user(&format!("user{i}@example.com"), "user", true)
                .await;
        }

        let res = app
            .get_with_token(&format!("{}?page=2&perPage=2", routes::USERS), &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"].as_array().unwrap().len(), 2);
        let pagination = &res.body["pagination"];
        assert_eq!(pagination["page"], 2);
        assert_eq!(pagination["perPage"], 2);
        assert_eq!(pagination["total"], 5);
        assert_eq!(pagination["totalPages"], 3);
    }

    #[tokio::test]
    async fn huge_page_number_returns_an_empty_page() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;

        let res = app
            .get_with_token(&format!("{}?page={}", routes::USERS, u64::MAX), &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert!(res.body["data"].as_array().unwrap().is_empty());
        assert_eq!(res.body["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn admin_fetches_a_user_by_id() {
        let app = TestApp::spawn().await;
        let token = app.admin_token().await;
        let other = app.create_user("other@example.com", "user", false).await;

        let res = app
            .get_with_token(&routes::user(other.id as i64), &token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"]["email"], "other@example.com");

        let missing = app.get_with_token(&routes::user(999_999), &token).await;
        assert_eq!(missing.status, 404);
        assert_eq!(missing.body["msg"], "User not found");
    }

    #[tokio::test]
    async fn regular_user_cannot_fetch_other_users() {
        let app = TestApp::spawn().await;
        let token = app.user_token().await;
        let other = app.create_user("other@example.com", "user", true).await;

        let res = app
            .get_with_token(&routes::user(other.id as i64), &token)
            .await;

        assert_eq!(res.status, 403);
    }
}
