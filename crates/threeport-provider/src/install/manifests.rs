//! Manifests installed on a threeport control-plane cluster

use threeport_common::{ProviderKind, CONTROL_PLANE_NAMESPACE, SUPPORT_SERVICES_NAMESPACE};

use crate::provider::kind::KIND_API_PORT;

/// Threeport REST API image
pub const API_SERVER_IMAGE: &str = "ghcr.io/threeport/threeport-rest-api:v0.1.3";

/// Workload controller image
pub const WORKLOAD_CONTROLLER_IMAGE: &str =
    "ghcr.io/threeport/threeport-workload-controller:v0.1.3";

/// Support services operator image (cloud only)
pub const SUPPORT_SERVICES_OPERATOR_IMAGE: &str =
    "ghcr.io/nukleros/support-services-operator:v0.1.5";

const DATABASE_IMAGE: &str = "cockroachdb/cockroach:v22.2.2";
const MESSAGE_BROKER_IMAGE: &str = "nats:2.9-alpine";
const FORWARD_PROXY_IMAGE: &str = "envoyproxy/envoy:v1.24.1";

/// Operator that provisions ingress, DNS and certificate support services
pub fn support_services_operator() -> String {
    format!(
        r#"---
apiVersion: v1
kind: Namespace
metadata:
  name: {ns}
---
apiVersion: v1
kind: ServiceAccount
metadata:
  name: support-services-operator
  namespace: {ns}
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRoleBinding
metadata:
  name: support-services-operator
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: ClusterRole
  name: cluster-admin
subjects:
- kind: ServiceAccount
  name: support-services-operator
  namespace: {ns}
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: support-services-operator
  namespace: {ns}
spec:
  replicas: 1
  selector:
    matchLabels:
      app.kubernetes.io/name: support-services-operator
  template:
    metadata:
      labels:
        app.kubernetes.io/name: support-services-operator
    spec:
      serviceAccountName: support-services-operator
      containers:
      - name: manager
        image: {image}
        imagePullPolicy: IfNotPresent
"#,
        ns = SUPPORT_SERVICES_NAMESPACE,
        image = SUPPORT_SERVICES_OPERATOR_IMAGE,
    )
}

/// Control-plane namespace, API dependencies (database and message broker)
/// and the API server itself.
///
/// On a local cluster the API pod publishes its port on the node so kind can
/// map it to the host; in the cloud the Service gets a load balancer instead.
pub fn api_server(provider: ProviderKind) -> String {
    let (service_type, host_port) = match provider {
        ProviderKind::Local => ("ClusterIP", format!("\n          hostPort: {}", KIND_API_PORT)),
        ProviderKind::Cloud => ("LoadBalancer", String::new()),
    };
    format!(
        r#"---
apiVersion: v1
kind: Namespace
metadata:
  name: {ns}
---
apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: crdb
  namespace: {ns}
spec:
  serviceName: crdb
  replicas: 1
  selector:
    matchLabels:
      app.kubernetes.io/name: crdb
  template:
    metadata:
      labels:
        app.kubernetes.io/name: crdb
    spec:
      containers:
      - name: cockroachdb
        image: {db_image}
        args: ["start-single-node", "--insecure"]
        ports:
        - containerPort: 26257
          name: grpc
---
apiVersion: v1
kind: Service
metadata:
  name: crdb
  namespace: {ns}
spec:
  selector:
    app.kubernetes.io/name: crdb
  ports:
  - name: grpc
    port: 26257
    targetPort: 26257
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: threeport-message-broker
  namespace: {ns}
spec:
  replicas: 1
  selector:
    matchLabels:
      app.kubernetes.io/name: threeport-message-broker
  template:
    metadata:
      labels:
        app.kubernetes.io/name: threeport-message-broker
    spec:
      containers:
      - name: nats
        image: {broker_image}
        args: ["-js"]
        ports:
        - containerPort: 4222
          name: client
---
apiVersion: v1
kind: Service
metadata:
  name: threeport-message-broker
  namespace: {ns}
spec:
  selector:
    app.kubernetes.io/name: threeport-message-broker
  ports:
  - name: client
    port: 4222
    targetPort: 4222
---
apiVersion: v1
kind: Secret
metadata:
  name: db-config
  namespace: {ns}
type: Opaque
stringData:
  DB_HOST: crdb
  DB_PORT: "26257"
  DB_USER: tp_rest_api
  DB_NAME: threeport_api
  DB_SSL_MODE: disable
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: threeport-api-server
  namespace: {ns}
spec:
  replicas: 1
  selector:
    matchLabels:
      app.kubernetes.io/name: threeport-api-server
  template:
    metadata:
      labels:
        app.kubernetes.io/name: threeport-api-server
    spec:
      containers:
      - name: api-server
        image: {api_image}
        imagePullPolicy: IfNotPresent
        args: ["-env-file=/etc/threeport/env", "-auto-migrate=true"]
        envFrom:
        - secretRef:
            name: db-config
        env:
        - name: NATS_HOST
          value: threeport-message-broker
        - name: NATS_PORT
          value: "4222"
        ports:
        - containerPort: {port}
          name: http{host_port}
---
apiVersion: v1
kind: Service
metadata:
  name: threeport-api-server
  namespace: {ns}
spec:
  type: {service_type}
  selector:
    app.kubernetes.io/name: threeport-api-server
  ports:
  - name: http
    port: 80
    targetPort: {port}
"#,
        ns = CONTROL_PLANE_NAMESPACE,
        db_image = DATABASE_IMAGE,
        broker_image = MESSAGE_BROKER_IMAGE,
        api_image = API_SERVER_IMAGE,
        port = KIND_API_PORT,
        host_port = host_port,
        service_type = service_type,
    )
}

/// Workload controller and its config secret
pub fn workload_controller() -> String {
    format!(
        r#"---
apiVersion: v1
kind: Secret
metadata:
  name: workload-controller-config
  namespace: {ns}
type: Opaque
stringData:
  API_SERVER: http://threeport-api-server
  MSG_BROKER_HOST: threeport-message-broker
  MSG_BROKER_PORT: "4222"
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: threeport-workload-controller
  namespace: {ns}
spec:
  replicas: 1
  selector:
    matchLabels:
      app.kubernetes.io/name: threeport-workload-controller
  template:
    metadata:
      labels:
        app.kubernetes.io/name: threeport-workload-controller
    spec:
      containers:
      - name: workload-controller
        image: {image}
        imagePullPolicy: IfNotPresent
        envFrom:
          - secretRef:
              name: workload-controller-config
"#,
        ns = CONTROL_PLANE_NAMESPACE,
        image = WORKLOAD_CONTROLLER_IMAGE,
    )
}

/// Workload definition document for the forward proxy seeded into every new
/// control plane
pub fn forward_proxy() -> String {
    format!(
        r#"---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: forward-proxy
spec:
  replicas: 1
  selector:
    matchLabels:
      app.kubernetes.io/name: forward-proxy
  template:
    metadata:
      labels:
        app.kubernetes.io/name: forward-proxy
    spec:
      containers:
      - name: envoy
        image: {image}
        ports:
        - containerPort: 8080
          name: http
---
apiVersion: v1
kind: Service
metadata:
  name: forward-proxy
spec:
  selector:
    app.kubernetes.io/name: forward-proxy
  ports:
  - name: http
    port: 80
    targetPort: 8080
"#,
        image = FORWARD_PROXY_IMAGE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use threeport_common::kube_utils::{parse_manifest, split_documents};

    fn kinds(manifests: &str) -> Vec<String> {
        split_documents(manifests)
            .into_iter()
            .map(|doc| parse_manifest(doc).unwrap().gvk.kind)
            .collect()
    }

    #[test]
    fn every_manifest_document_parses() {
        for manifests in [
            support_services_operator(),
            api_server(ProviderKind::Local),
            api_server(ProviderKind::Cloud),
            workload_controller(),
            forward_proxy(),
        ] {
            assert!(!kinds(&manifests).is_empty());
        }
    }

    #[test]
    fn api_server_exposure_depends_on_provider() {
        let local = api_server(ProviderKind::Local);
        assert!(local.contains("hostPort: 1323"));
        assert!(local.contains("type: ClusterIP"));

        let cloud = api_server(ProviderKind::Cloud);
        assert!(!cloud.contains("hostPort"));
        assert!(cloud.contains("type: LoadBalancer"));
    }

    #[test]
    fn api_server_brings_its_dependencies() {
        let kinds = kinds(&api_server(ProviderKind::Local));
        assert_eq!(kinds.first().map(String::as_str), Some("Namespace"));
        assert!(kinds.iter().any(|k| k == "StatefulSet"));
        assert_eq!(kinds.iter().filter(|k| *k == "Deployment").count(), 2);
    }

    #[test]
    fn workload_controller_is_configured_from_its_secret() {
        let manifests = workload_controller();
        assert_eq!(kinds(&manifests), vec!["Secret", "Deployment"]);
        assert!(manifests.contains(WORKLOAD_CONTROLLER_IMAGE));
        assert!(manifests.contains("namespace: threeport-control-plane"));
    }
}
