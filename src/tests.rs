#[cfg(test)]
mod integration_tests {
    use crate::handlers::auth::{LoginRequest, SignupRequest};
    use crate::handlers::messages::CreateMessageRequest;
    use crate::handlers::users::UpdateProfileRequest;
    use crate::schemas::ApiResponse;
    use crate::test_utils::test_utils::{create_test_user, log_in, setup_test_server};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::Utc;
    use model::entities::{follow, message, user};
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};

    /// Sign a user up through the API; the server is logged in as that user
    /// afterwards, since signup establishes a session.
    async fn signup(server: &TestServer, username: &str, email: &str, password: &str) -> i64 {
        let request = SignupRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            image_url: None,
        };

        let response = server.post("/signup").json(&request).await;
        response.assert_status(StatusCode::CREATED);

        let body: ApiResponse<serde_json::Value> = response.json();
        assert!(body.success);
        body.data["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (server, _state) = setup_test_server().await;

        let response = server.get("/health").await;

        response.assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_signup() {
        let (server, _state) = setup_test_server().await;

        let request = SignupRequest {
            username: "testuser".to_string(),
            email: "test@test.com".to_string(),
            password: "testuser".to_string(),
            image_url: None,
        };

        let response = server.post("/signup").json(&request).await;

        if response.status_code() != StatusCode::CREATED {
            let error_body = response.text();
            println!("Error response: {}", error_body);
            panic!("Expected 201 Created, got {}", response.status_code());
        }
        let body: ApiResponse<serde_json::Value> = response.json();
        assert!(body.success);
        assert_eq!(body.message, "User created successfully");

        // Verify user data; the password never comes back
        let user_data = &body.data;
        assert_eq!(user_data["username"], "testuser");
        assert_eq!(user_data["email"], "test@test.com");
        assert!(user_data["id"].as_i64().unwrap() > 0);
        assert!(user_data.get("password").is_none());
        assert!(user_data.get("password_hash").is_none());

        // Signup also starts a session
        let profile_response = server.get("/users/profile").await;
        profile_response.assert_status(StatusCode::OK);
        let profile: ApiResponse<serde_json::Value> = profile_response.json();
        assert_eq!(profile.data["username"], "testuser");
    }

    #[tokio::test]
    async fn test_signup_duplicate_username() {
        let (server, _state) = setup_test_server().await;

        signup(&server, "duplicateuser", "first@test.com", "testuser").await;

        // Same username, different email
        let request = SignupRequest {
            username: "duplicateuser".to_string(),
            email: "second@test.com".to_string(),
            password: "testuser".to_string(),
            image_url: None,
        };
        let response = server.post("/signup").json(&request).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let error_body: serde_json::Value = response.json();
        assert_eq!(error_body["success"], false);
        assert_eq!(error_body["code"], "USERNAME_ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_signup_duplicate_email() {
        let (server, _state) = setup_test_server().await;

        signup(&server, "firstuser", "same@test.com", "testuser").await;

        let request = SignupRequest {
            username: "seconduser".to_string(),
            email: "same@test.com".to_string(),
            password: "testuser".to_string(),
            image_url: None,
        };
        let response = server.post("/signup").json(&request).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let error_body: serde_json::Value = response.json();
        assert_eq!(error_body["success"], false);
        assert_eq!(error_body["code"], "EMAIL_ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_signup_short_password() {
        let (server, _state) = setup_test_server().await;

        // Too short for the validator
        let request = SignupRequest {
            username: "testuser".to_string(),
            email: "test@test.com".to_string(),
            password: "abc".to_string(),
            image_url: None,
        };
        let response = server.post("/signup").json(&request).await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;

        // Login
        let response = server
            .post("/login")
            .json(&LoginRequest {
                username: "testuser".to_string(),
                password: "testuser".to_string(),
            })
            .await;
        response.assert_status(StatusCode::OK);
        let body: ApiResponse<serde_json::Value> = response.json();
        assert!(body.success);
        assert_eq!(body.message, "Login successful");
        assert_eq!(body.data["username"], "testuser");

        // The session now authenticates requests
        let profile_response = server.get("/users/profile").await;
        profile_response.assert_status(StatusCode::OK);

        // Logout clears it again
        let logout_response = server.post("/logout").await;
        logout_response.assert_status(StatusCode::OK);

        let profile_response = server.get("/users/profile").await;
        profile_response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;

        let response = server
            .post("/login")
            .json(&LoginRequest {
                username: "testuser".to_string(),
                password: "wrong".to_string(),
            })
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let error_body: serde_json::Value = response.json();
        assert_eq!(error_body["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn test_login_unknown_user() {
        let (server, _state) = setup_test_server().await;

        let response = server
            .post("/login")
            .json(&LoginRequest {
                username: "nobody".to_string(),
                password: "testuser".to_string(),
            })
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_add_message() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        let response = server
            .post("/messages/new")
            .json(&CreateMessageRequest {
                text: "Hello".to_string(),
            })
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<serde_json::Value> = response.json();
        assert!(body.success);
        assert_eq!(body.data["text"], "Hello");
        assert_eq!(body.data["username"], "testuser");

        // The message landed in the database
        let messages = message::Entity::find().all(&state.db).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "Hello");
    }

    #[tokio::test]
    async fn test_add_message_logged_out() {
        let (server, state) = setup_test_server().await;

        let response = server
            .post("/messages/new")
            .json(&CreateMessageRequest {
                text: "Bad post".to_string(),
            })
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);

        // Nothing was created
        let messages = message::Entity::find().all(&state.db).await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_add_message_too_long() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        let response = server
            .post("/messages/new")
            .json(&CreateMessageRequest {
                text: "x".repeat(141),
            })
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_message() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        let create_response = server
            .post("/messages/new")
            .json(&CreateMessageRequest {
                text: "Hello test world".to_string(),
            })
            .await;
        create_response.assert_status(StatusCode::CREATED);
        let create_body: ApiResponse<serde_json::Value> = create_response.json();
        let message_id = create_body.data["id"].as_i64().unwrap();

        let response = server.get(&format!("/messages/{}", message_id)).await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<serde_json::Value> = response.json();
        assert!(body.success);
        assert_eq!(body.data["text"], "Hello test world");
        assert_eq!(body.data["username"], "testuser");
    }

    #[tokio::test]
    async fn test_delete_message() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        let create_response = server
            .post("/messages/new")
            .json(&CreateMessageRequest {
                text: "Delete me plz".to_string(),
            })
            .await;
        create_response.assert_status(StatusCode::CREATED);
        let create_body: ApiResponse<serde_json::Value> = create_response.json();
        let message_id = create_body.data["id"].as_i64().unwrap();

        let delete_response = server
            .post(&format!("/messages/{}/delete", message_id))
            .await;
        delete_response.assert_status(StatusCode::OK);
        let delete_body: ApiResponse<String> = delete_response.json();
        assert!(delete_body.success);
        assert_eq!(delete_body.data, format!("Message {} deleted", message_id));

        // Viewing the deleted message is a 404, not a server error
        let get_response = server.get(&format!("/messages/{}", message_id)).await;
        get_response.assert_status(StatusCode::NOT_FOUND);

        let messages = message::Entity::find().all(&state.db).await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_delete_message_not_owner() {
        let (server, _state) = setup_test_server().await;

        // The first user posts a message
        signup(&server, "owner", "owner@test.com", "testuser").await;
        let create_response = server
            .post("/messages/new")
            .json(&CreateMessageRequest {
                text: "mine".to_string(),
            })
            .await;
        create_response.assert_status(StatusCode::CREATED);
        let create_body: ApiResponse<serde_json::Value> = create_response.json();
        let message_id = create_body.data["id"].as_i64().unwrap();

        // A second user signs up; the session now belongs to them
        signup(&server, "intruder", "intruder@test.com", "testuser").await;

        let delete_response = server
            .post(&format!("/messages/{}/delete", message_id))
            .await;

        delete_response.assert_status(StatusCode::FORBIDDEN);
        let error_body: serde_json::Value = delete_response.json();
        assert_eq!(error_body["code"], "FORBIDDEN");

        // The message survived
        let get_response = server.get(&format!("/messages/{}", message_id)).await;
        get_response.assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_message_logged_out() {
        let (server, state) = setup_test_server().await;
        let owner = create_test_user(&state, "owner", "owner@test.com", "testuser").await;

        let msg = message::ActiveModel {
            text: Set("untouchable".to_string()),
            timestamp: Set(Utc::now()),
            user_id: Set(owner.id),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap();

        let response = server.post(&format!("/messages/{}/delete", msg.id)).await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_delete_missing_message() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        let response = server.post("/messages/99999/delete").await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_users() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        create_test_user(&state, "u2", "u2@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        let response = server.get("/users").await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Vec<serde_json::Value>> = response.json();
        assert!(body.success);
        assert_eq!(body.data.len(), 2);
        assert!(body.data.iter().any(|u| u["username"] == "testuser"));
        assert!(body.data.iter().any(|u| u["username"] == "u2"));
    }

    #[tokio::test]
    async fn test_list_users_requires_login() {
        let (server, _state) = setup_test_server().await;

        let response = server.get("/users").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_search_users() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "warbler-fan", "fan@test.com", "testuser").await;
        create_test_user(&state, "someone-else", "else@test.com", "testuser").await;
        log_in(&server, "warbler-fan", "testuser").await;

        let response = server.get("/users").add_query_param("q", "warbler").await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Vec<serde_json::Value>> = response.json();
        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0]["username"], "warbler-fan");
    }

    #[tokio::test]
    async fn test_user_profile_page() {
        let (server, state) = setup_test_server().await;
        let shown = create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        let viewer = create_test_user(&state, "viewer", "viewer@test.com", "testuser").await;

        // One message and one follower for the profile
        message::ActiveModel {
            text: Set("profile warble".to_string()),
            timestamp: Set(Utc::now()),
            user_id: Set(shown.id),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap();

        follow::ActiveModel {
            user_being_followed_id: Set(shown.id),
            user_following_id: Set(viewer.id),
        }
        .insert(&state.db)
        .await
        .unwrap();

        log_in(&server, "viewer", "testuser").await;

        let response = server.get(&format!("/users/{}", shown.id)).await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<serde_json::Value> = response.json();
        assert!(body.success);
        assert_eq!(body.data["user"]["username"], "testuser");
        assert_eq!(body.data["followers_count"], 1);
        assert_eq!(body.data["following_count"], 0);

        let messages = body.data["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["text"], "profile warble");
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        let response = server.get("/users/99999").await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        let response = server
            .post("/users/profile")
            .json(&UpdateProfileRequest {
                username: Some("updateduser".to_string()),
                email: None,
                bio: Some("warbling away".to_string()),
                location: Some("the canopy".to_string()),
                image_url: None,
                header_image_url: None,
                password: "testuser".to_string(),
            })
            .await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<serde_json::Value> = response.json();
        assert!(body.success);
        assert_eq!(body.data["username"], "updateduser");
        assert_eq!(body.data["bio"], "warbling away");

        // The update persisted
        let get_response = server.get("/users/profile").await;
        get_response.assert_status(StatusCode::OK);
        let profile: ApiResponse<serde_json::Value> = get_response.json();
        assert_eq!(profile.data["username"], "updateduser");
        assert_eq!(profile.data["location"], "the canopy");
    }

    #[tokio::test]
    async fn test_update_profile_wrong_password() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        let response = server
            .post("/users/profile")
            .json(&UpdateProfileRequest {
                username: Some("hacked".to_string()),
                email: None,
                bio: None,
                location: None,
                image_url: None,
                header_image_url: None,
                password: "wrong-password".to_string(),
            })
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let error_body: serde_json::Value = response.json();
        assert_eq!(error_body["code"], "INVALID_PASSWORD");

        // Nothing changed
        let users = user::Entity::find().all(&state.db).await.unwrap();
        assert_eq!(users[0].username, "testuser");
    }

    #[tokio::test]
    async fn test_follow_and_unfollow() {
        let (server, state) = setup_test_server().await;
        let u1 = create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        let u2 = create_test_user(&state, "u2", "u2@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        // Follow
        let response = server.post(&format!("/users/follow/{}", u2.id)).await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<serde_json::Value> = response.json();
        assert_eq!(body.data["username"], "u2");

        // Both sides of the relation see it
        let following_response = server.get(&format!("/users/{}/following", u1.id)).await;
        following_response.assert_status(StatusCode::OK);
        let following: ApiResponse<Vec<serde_json::Value>> = following_response.json();
        assert_eq!(following.data.len(), 1);
        assert_eq!(following.data[0]["username"], "u2");

        let followers_response = server.get(&format!("/users/{}/followers", u2.id)).await;
        followers_response.assert_status(StatusCode::OK);
        let followers: ApiResponse<Vec<serde_json::Value>> = followers_response.json();
        assert_eq!(followers.data.len(), 1);
        assert_eq!(followers.data[0]["username"], "testuser");

        // Unfollow
        let response = server.post(&format!("/users/stop-following/{}", u2.id)).await;
        response.assert_status(StatusCode::OK);

        let following_response = server.get(&format!("/users/{}/following", u1.id)).await;
        let following: ApiResponse<Vec<serde_json::Value>> = following_response.json();
        assert!(following.data.is_empty());
    }

    #[tokio::test]
    async fn test_follow_self() {
        let (server, state) = setup_test_server().await;
        let u1 = create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        let response = server.post(&format!("/users/follow/{}", u1.id)).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let error_body: serde_json::Value = response.json();
        assert_eq!(error_body["code"], "CANNOT_FOLLOW_SELF");
    }

    #[tokio::test]
    async fn test_follow_missing_user() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        let response = server.post("/users/follow/99999").await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_follow_twice() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        let u2 = create_test_user(&state, "u2", "u2@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        let response = server.post(&format!("/users/follow/{}", u2.id)).await;
        response.assert_status(StatusCode::CREATED);

        let response = server.post(&format!("/users/follow/{}", u2.id)).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error_body: serde_json::Value = response.json();
        assert_eq!(error_body["code"], "ALREADY_FOLLOWING");
    }

    #[tokio::test]
    async fn test_unfollow_not_following() {
        let (server, state) = setup_test_server().await;
        create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        let u2 = create_test_user(&state, "u2", "u2@test.com", "testuser").await;
        log_in(&server, "testuser", "testuser").await;

        let response = server.post(&format!("/users/stop-following/{}", u2.id)).await;

        response.assert_status(StatusCode::NOT_FOUND);
        let error_body: serde_json::Value = response.json();
        assert_eq!(error_body["code"], "NOT_FOLLOWING");
    }

    #[tokio::test]
    async fn test_home_timeline() {
        let (server, state) = setup_test_server().await;
        let me = create_test_user(&state, "testuser", "test@test.com", "testuser").await;
        let friend = create_test_user(&state, "friend", "friend@test.com", "testuser").await;
        let stranger = create_test_user(&state, "stranger", "stranger@test.com", "testuser").await;

        for (author, text, minutes_ago) in [
            (me.id, "my own warble", 3),
            (friend.id, "friendly warble", 2),
            (stranger.id, "stranger noise", 1),
        ] {
            message::ActiveModel {
                text: Set(text.to_string()),
                timestamp: Set(Utc::now() - chrono::Duration::minutes(minutes_ago)),
                user_id: Set(author),
                ..Default::default()
            }
            .insert(&state.db)
            .await
            .unwrap();
        }

        follow::ActiveModel {
            user_being_followed_id: Set(friend.id),
            user_following_id: Set(me.id),
        }
        .insert(&state.db)
        .await
        .unwrap();

        log_in(&server, "testuser", "testuser").await;

        let response = server.get("/home").await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Vec<serde_json::Value>> = response.json();
        assert!(body.success);

        // Own and followed messages only, newest first
        let texts: Vec<&str> = body
            .data
            .iter()
            .map(|m| m["text"].as_str().unwrap())
            .collect();
        assert_eq!(texts, vec!["friendly warble", "my own warble"]);
    }

    #[tokio::test]
    async fn test_home_timeline_requires_login() {
        let (server, _state) = setup_test_server().await;

        let response = server.get("/home").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_delete_account() {
        let (server, state) = setup_test_server().await;
        signup(&server, "doomed", "doomed@test.com", "testuser").await;

        let message_response = server
            .post("/messages/new")
            .json(&CreateMessageRequest {
                text: "last words".to_string(),
            })
            .await;
        message_response.assert_status(StatusCode::CREATED);

        let response = server.post("/users/delete").await;
        response.assert_status(StatusCode::OK);

        // The session is gone with the account
        let profile_response = server.get("/users/profile").await;
        profile_response.assert_status(StatusCode::UNAUTHORIZED);

        // And so are the user and their messages
        assert!(user::Entity::find().all(&state.db).await.unwrap().is_empty());
        assert!(message::Entity::find()
            .all(&state.db)
            .await
            .unwrap()
            .is_empty());

        // Logging back in is no longer possible
        let login_response = server
            .post("/login")
            .json(&LoginRequest {
                username: "doomed".to_string(),
                password: "testuser".to_string(),
            })
            .await;
        login_response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
